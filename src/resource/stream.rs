use serde::{Deserialize, Serialize};

/// Spec of a `Stream`: a named pipeline of apps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Pipeline definition as written by the user; informational only.
    #[serde(default)]
    pub dsl: Option<String>,
    #[serde(default)]
    pub apps: Vec<App>,
}

/// One stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    /// Role of the app, e.g. `source`, `processor` or `sink`.
    #[serde(rename = "type")]
    pub app_type: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl App {
    /// Name of the StreamApp this app is launched from, `<name>-<type>`.
    pub fn composite_name(&self) -> String {
        format!("{}-{}", self.name, self.app_type)
    }

    /// Value of the first property called `key`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|prop| prop.name == key)
            .map(|prop| prop.value.as_str())
    }

    /// Launch arguments, one `--<name>=<value>` per property in declaration order.
    pub fn args(&self) -> Vec<String> {
        self.properties
            .iter()
            .map(|prop| format!("--{}={}", prop.name, prop.value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(properties: &[(&str, &str)]) -> App {
        App {
            name: "http".into(),
            app_type: "source".into(),
            properties: properties
                .iter()
                .map(|(name, value)| Property {
                    name: (*name).into(),
                    value: (*value).into(),
                })
                .collect(),
        }
    }

    #[test]
    fn first_property_wins() {
        let app = app(&[("port", "9000"), ("port", "9001")]);
        assert_eq!(app.property("port"), Some("9000"));
        assert_eq!(app.property("path"), None);
    }

    #[test]
    fn args_keep_declaration_order() {
        let http = app(&[("port", "9000"), ("path-pattern", "/orders")]);
        assert_eq!(http.args(), ["--port=9000", "--path-pattern=/orders"]);
        assert!(app(&[]).args().is_empty());
    }
}
