//! Settings (serializable) and start options (code).

use std::rc::Rc;

use serde::{Serialize, Deserialize};

use crate::{
    error::ConfigurationError,
    methods::MethodRegistry,
    store::Store,
    http::Transport,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub open_delimiter: String,
    pub close_delimiter: String,
    /// The directive attributes are this plus `-id`, `-namespace`,
    /// `-state`, `-if`, `-for` and `-actions`.
    pub attribute_prefix: String,
    /// Stripped from the start of interpolations, `{{= x }}`.
    pub print_marker: String,
    /// Element holding a rendered template in the document.
    pub container_tag: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            open_delimiter: "{{".into(),
            close_delimiter: "}}".into(),
            attribute_prefix: "data-sprinkle".into(),
            print_marker: "=".into(),
            container_tag: "div".into(),
        }
    }
}

/// The full attribute names derived from `Settings::attribute_prefix`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNames {
    pub id: String,
    pub namespace: String,
    pub state: String,
    pub condition: String,
    pub repeat: String,
    pub actions: String,
}

impl Settings {
    pub fn from_json(s: &str) -> Result<Self, ConfigurationError> {
        let settings: Settings = serde_json::from_str(s)?;
        settings.check()?;
        Ok(settings)
    }

    pub fn check(&self) -> Result<(), ConfigurationError> {
        if self.open_delimiter.is_empty() {
            return Err(ConfigurationError::EmptyDelimiter("opening"))
        }
        if self.close_delimiter.is_empty() {
            return Err(ConfigurationError::EmptyDelimiter("closing"))
        }
        Ok(())
    }

    pub fn attribute_names(&self) -> AttributeNames {
        let name = |suffix: &str| format!("{}-{suffix}", self.attribute_prefix);
        AttributeNames {
            id: name("id"),
            namespace: name("namespace"),
            state: name("state"),
            condition: name("if"),
            repeat: name("for"),
            actions: name("actions"),
        }
    }
}

/// Returns the methods added to (or replacing) the defaults; gets the
/// store so that methods can read state.
pub type MethodOverrides = Box<dyn Fn(&Rc<dyn Store>) -> MethodRegistry>;

#[derive(Default)]
pub struct Options {
    pub settings: Settings,
    pub method_overrides: Option<MethodOverrides>,
    /// Used by the default `get`, `post` and `put` methods; a
    /// `ReqwestTransport` if not given.
    pub transport: Option<Rc<dyn Transport>>,
}

impl Options {
    pub fn with_settings(self, settings: Settings) -> Self {
        Options { settings, ..self }
    }

    pub fn with_methods(
        self,
        overrides: impl Fn(&Rc<dyn Store>) -> MethodRegistry + 'static
    ) -> Self {
        Options { method_overrides: Some(Box::new(overrides)), ..self }
    }

    pub fn with_transport(self, transport: Rc<dyn Transport>) -> Self {
        Options { transport: Some(transport), ..self }
    }
}
