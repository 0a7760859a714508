//! The rendered form of an event, as handed to outputs.

use std::collections::BTreeMap;

/// Key of the rendered title.
pub const TITLE_KEY: &str = "title";
/// Key of the rendered description.
pub const DESCRIPTION_KEY: &str = "description";
/// Key of the rendered link, when the template produces one.
pub const URL_KEY: &str = "url";

/// Output-ready fields keyed by name (`title`, `description`, `url`).
pub type RenderedFields = BTreeMap<String, String>;

/// Convenience accessors over [`RenderedFields`].
pub trait RenderedFieldsExt {
    /// The title, or an empty string.
    fn title(&self) -> &str;
    /// The description, or an empty string.
    fn description(&self) -> &str;
    /// The url, when present and non-empty.
    fn url(&self) -> Option<&str>;
}

impl RenderedFieldsExt for RenderedFields {
    fn title(&self) -> &str {
        self.get(TITLE_KEY).map(String::as_str).unwrap_or_default()
    }

    fn description(&self) -> &str {
        self.get(DESCRIPTION_KEY).map(String::as_str).unwrap_or_default()
    }

    fn url(&self) -> Option<&str> {
        self.get(URL_KEY).map(String::as_str).filter(|u| !u.is_empty())
    }
}

/// Builds fields from a title, description and optional url.
pub fn rendered(title: &str, description: &str, url: Option<&str>) -> RenderedFields {
    let mut fields = RenderedFields::new();
    fields.insert(TITLE_KEY.to_string(), title.to_string());
    fields.insert(DESCRIPTION_KEY.to_string(), description.to_string());
    if let Some(url) = url {
        fields.insert(URL_KEY.to_string(), url.to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let fields = rendered("t", "d", Some(""));
        assert_eq!(fields.title(), "t");
        assert_eq!(fields.description(), "d");
        assert_eq!(fields.url(), None);

        let empty = RenderedFields::new();
        assert_eq!(empty.title(), "");
    }
}
