use crate::{Error, Result};
use handlebars::{Handlebars, no_escape};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct HandleBars<'a> {
    engine: Handlebars<'a>,
}

impl Default for HandleBars<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleBars<'_> {
    /// An engine rendering yaml: no html escaping, missing values are errors
    #[must_use]
    pub fn new() -> HandleBars<'static> {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(no_escape);
        engine.set_strict_mode(true);
        HandleBars { engine }
    }

    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.engine
            .register_template_string(name, template)
            .map_err(Error::HbsTemplateError)
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        self.engine.render(name, data).map_err(Error::HbsRenderError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_html_escaping() {
        let mut hbs = HandleBars::new();
        hbs.register_template("t", "config: \"{{value}}\"").unwrap();
        let out = hbs.render("t", &json!({"value": "a=b&c<d"})).unwrap();
        assert_eq!(out, "config: \"a=b&c<d\"");
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let mut hbs = HandleBars::new();
        hbs.register_template("t", "{{missing}}").unwrap();
        assert!(hbs.render("t", &json!({})).is_err());
    }

    #[test]
    fn test_unknown_template_is_an_error() {
        let hbs = HandleBars::new();
        assert!(hbs.render("nope", &json!({})).is_err());
    }
}
