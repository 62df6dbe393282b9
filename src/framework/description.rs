//! Schema description builder.
//!
//! A [`SchemaDescription`] carries a plain-text and a markdown rendering of the
//! same text. Every append goes through [`SchemaDescription::append_markdown`],
//! which cleans the current text, terminates it with `".  "` and appends the new
//! sentence, so builders compose in any order.

use std::{collections::BTreeMap, fmt::Display, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

static TRAILING_STOP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\.\s*)+$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDescription {
    pub description: String,
    pub markdown_description: String,
}

/// Plain-text rendering of markdown: code backticks become double quotes.
fn markdown_to_plain(text: &str) -> String {
    text.replace('`', "\"")
}

impl SchemaDescription {
    /// Build a description from markdown text.
    pub fn from_markdown(markdown: impl Into<String>) -> Self {
        let markdown = markdown.into();
        Self {
            description: markdown_to_plain(&markdown),
            markdown_description: markdown,
        }
        .clean(false)
    }

    /// Normalise whitespace, optionally strip trailing full stops, and fill an
    /// empty side from the other.
    pub fn clean(mut self, trim_period: bool) -> Self {
        if trim_period {
            self.description = TRAILING_STOP.replace(&self.description, "").into_owned();
            self.markdown_description = TRAILING_STOP
                .replace(&self.markdown_description, "")
                .into_owned();
        }

        self.description = self.description.trim().to_string();
        self.markdown_description = self.markdown_description.trim().to_string();

        if self.markdown_description.is_empty() && !self.description.is_empty() {
            self.markdown_description = self.description.clone();
        }

        if self.description.is_empty() && !self.markdown_description.is_empty() {
            self.description = markdown_to_plain(&self.markdown_description);
        }

        self
    }

    pub fn default_value(self, value: impl Display) -> Self {
        self.append_string_value("Defaults to", &value.to_string())
    }

    pub fn fixed_value(self, value: impl Display) -> Self {
        self.append_string_value("Fixed value of", &value.to_string())
    }

    /// Document the allowed values, sorted lexicographically.
    pub fn allowed_values<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Display,
    {
        let mut values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        values.sort();
        self.append_slice_values("Options are", &values)
    }

    /// Document the allowed values of an enumeration.
    pub fn allowed_values_enum<E: AsRef<str>>(self, values: &[E]) -> Self {
        self.allowed_values(values.iter().map(|v| v.as_ref()))
    }

    /// Document allowed values that each need an explanation.
    pub fn allowed_values_complex(self, values: &BTreeMap<&str, &str>) -> Self {
        let mut rendered: Vec<String> = values
            .iter()
            .map(|(k, v)| format!("`{}` ({})", k, v))
            .collect();
        rendered.sort();
        self.append_markdown(&format!("Options are {}.", rendered.join(", ")))
    }

    pub fn conflicts_with<S: AsRef<str>>(self, paths: &[S]) -> Self {
        self.append_slice_values("Conflicts with", paths)
    }

    /// Documents an exactly-one-of constraint. The rendered text matches
    /// [`at_least_one_of`](Self::at_least_one_of); only the validator differs.
    pub fn exactly_one_of<S: AsRef<str>>(self, paths: &[S]) -> Self {
        self.append_slice_values("At least one of the following must be defined:", paths)
    }

    pub fn at_least_one_of<S: AsRef<str>>(self, paths: &[S]) -> Self {
        self.append_slice_values("At least one of the following must be defined:", paths)
    }

    pub fn requires_replace(self) -> Self {
        self.append_markdown("This field is immutable and will trigger a replace plan if changed.")
    }

    pub fn requires_replace_nested_attributes(self) -> Self {
        self.append_markdown(
            "If this object is added or removed, a replacement plan is triggered.  Parameters within the object are subject to their own immutability rules.",
        )
    }

    pub fn unmodifiable_data_loss_protection(self) -> Self {
        self.append_markdown(
            "This field is immutable and cannot be changed once defined.  To protect against accidental data loss, this resource must be replaced manually (for example, by using Terraform's [plan `-replace` command option](https://developer.hashicorp.com/terraform/cli/commands/plan#replace-address)).  Any data that is stored against this resource must be manually exported before the resource is removed and re-imported once the resource has been replaced.",
        )
    }

    /// Resource-level note that only one instance should exist per environment.
    pub fn only_one_definition_per_environment(mut self, resource_name: &str) -> Self {
        let note = format!(
            "\n\n~> Only one `{0}` resource should be configured for an environment.  If multiple `{0}` resource definitions for an environment have been defined, these are likely to conflict with each other on apply.",
            resource_name
        );
        self = self.clean(false);
        self.description.push_str(&markdown_to_plain(&note));
        self.markdown_description.push_str(&note);
        self
    }

    /// Append ``"<pretext> `v1`, `v2`."``.
    pub fn append_slice_values<S: AsRef<str>>(self, pretext: &str, values: &[S]) -> Self {
        let joined = values
            .iter()
            .map(|v| v.as_ref())
            .collect::<Vec<_>>()
            .join("`, `");
        self.append_markdown(&format!("{} `{}`.", pretext.trim(), joined))
    }

    /// Append ``"<pretext> `value`."``.
    pub fn append_string_value(self, pretext: &str, value: &str) -> Self {
        self.append_markdown(&format!("{} `{}`.", pretext.trim(), value.trim()))
    }

    /// Canonical appender.
    pub fn append_markdown(self, text: &str) -> Self {
        let text = text.trim();
        let mut this = self.clean(true);

        if !this.description.is_empty() {
            this.description.push_str(".  ");
        }
        this.description.push_str(&markdown_to_plain(text));

        if !this.markdown_description.is_empty() {
            this.markdown_description.push_str(".  ");
        }
        this.markdown_description.push_str(text);

        this
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn desc(plain: &str, md: &str) -> SchemaDescription {
        SchemaDescription {
            description: plain.to_string(),
            markdown_description: md.to_string(),
        }
    }

    #[rstest]
    #[case::markdown_only(
        desc("", "test123 this is a description - md"),
        false,
        desc("test123 this is a description - md", "test123 this is a description - md")
    )]
    #[case::plain_only(
        desc("test123 this is a description", ""),
        false,
        desc("test123 this is a description", "test123 this is a description")
    )]
    #[case::both_set_untouched(
        desc("plain form", "md `form`"),
        false,
        desc("plain form", "md `form`")
    )]
    #[case::surrounding_whitespace(
        desc("  padded plain \n", "\t padded md "),
        false,
        desc("padded plain", "padded md")
    )]
    #[case::trailing_period_kept(
        desc("", "test123 this is a formatted."),
        false,
        desc("test123 this is a formatted.", "test123 this is a formatted.")
    )]
    #[case::trailing_period_removed(
        desc("", "test123 this is a formatted."),
        true,
        desc("test123 this is a formatted", "test123 this is a formatted")
    )]
    #[case::trailing_period_and_space_removed(
        desc("ends here.  ", "ends here. \n"),
        true,
        desc("ends here", "ends here")
    )]
    #[case::repeated_periods_removed(
        desc("", "ellipsis..."),
        true,
        desc("ellipsis", "ellipsis")
    )]
    #[case::backticks_become_quotes(
        desc("", "set `value` here"),
        false,
        desc("set \"value\" here", "set `value` here")
    )]
    #[case::empty(desc("", ""), true, desc("", ""))]
    fn test_clean(
        #[case] input: SchemaDescription,
        #[case] trim_period: bool,
        #[case] expected: SchemaDescription,
    ) {
        assert_eq!(input.clean(trim_period), expected);
    }

    #[rstest]
    #[case(desc("", "Some text.  "))]
    #[case(desc("a. b.", ""))]
    #[case(desc("x", "y `z`."))]
    #[case(desc("", ""))]
    fn test_clean_is_idempotent(#[case] input: SchemaDescription) {
        for trim in [true, false] {
            let once = input.clone().clean(trim);
            assert_eq!(once.clone().clean(trim), once);
        }
        let trimmed = input.clean(true);
        assert!(!trimmed.description.ends_with('.'));
        assert!(!trimmed.description.ends_with(char::is_whitespace));
    }

    #[test]
    fn test_default_value() {
        let d = SchemaDescription::from_markdown("The status of the rule.").default_value("ACTIVE");
        assert_eq!(
            d.markdown_description,
            "The status of the rule.  Defaults to `ACTIVE`."
        );
        assert_eq!(d.description, "The status of the rule.  Defaults to \"ACTIVE\".");
    }

    #[test]
    fn test_fixed_value_number_and_bool() {
        let d = SchemaDescription::from_markdown("A").fixed_value(42);
        assert_eq!(d.markdown_description, "A.  Fixed value of `42`.");
        let d = SchemaDescription::from_markdown("B").default_value(false);
        assert_eq!(d.markdown_description, "B.  Defaults to `false`.");
    }

    #[test]
    fn test_allowed_values_sorted() {
        let d = SchemaDescription::from_markdown("Mode")
            .allowed_values(["PERIODIC", "ON_DEMAND"]);
        assert_eq!(
            d.markdown_description,
            "Mode.  Options are `ON_DEMAND`, `PERIODIC`."
        );
    }

    #[test]
    fn test_allowed_values_enum() {
        let d = SchemaDescription::default().allowed_values_enum(&["SG", "AP", "EU"]);
        assert_eq!(d.markdown_description, "Options are `AP`, `EU`, `SG`.");
        assert_eq!(d.description, "Options are \"AP\", \"EU\", \"SG\".");
    }

    #[test]
    fn test_allowed_values_complex() {
        let mut values = BTreeMap::new();
        values.insert("MANAGED", "the credential is managed by an external system");
        values.insert("AUTOMATED", "issued by issuance rules");
        let d = SchemaDescription::from_markdown("Mode").allowed_values_complex(&values);
        assert_eq!(
            d.markdown_description,
            "Mode.  Options are `AUTOMATED` (issued by issuance rules), `MANAGED` (the credential is managed by an external system)."
        );
    }

    #[test]
    fn test_conflicts_with() {
        let d = SchemaDescription::from_markdown("A filter").conflicts_with(&["scim"]);
        assert_eq!(d.markdown_description, "A filter.  Conflicts with `scim`.");
    }

    #[rstest]
    #[case::exactly_one_of(
        SchemaDescription::from_markdown("A filter").exactly_one_of(&["group_ids", "population_ids", "scim"]),
        "A filter.  At least one of the following must be defined: `group_ids`, `population_ids`, `scim`."
    )]
    #[case::at_least_one_of(
        SchemaDescription::default().at_least_one_of(&["a", "b"]),
        "At least one of the following must be defined: `a`, `b`."
    )]
    fn test_one_of_suffix(#[case] d: SchemaDescription, #[case] expected: &str) {
        assert_eq!(d.markdown_description, expected);
    }

    #[test]
    fn test_requires_replace_appends_once_per_call() {
        let d = SchemaDescription::from_markdown("The ID of the environment.").requires_replace();
        assert_eq!(
            d.description,
            "The ID of the environment.  This field is immutable and will trigger a replace plan if changed."
        );
        let twice = d.clone().requires_replace();
        assert!(twice.description.starts_with(&d.description));
        assert!(twice.description.ends_with("changed."));
    }

    #[test]
    fn test_append_to_empty_has_no_separator() {
        let d = SchemaDescription::default().requires_replace_nested_attributes();
        assert!(d.markdown_description.starts_with("If this object"));
    }

    #[test]
    fn test_only_one_definition_per_environment() {
        let d = SchemaDescription::from_markdown("Resource to manage the `x` settings.")
            .only_one_definition_per_environment("pingone_x");
        assert!(d.markdown_description.contains("\n\n~> Only one `pingone_x` resource"));
        assert!(d.description.contains("Only one \"pingone_x\" resource"));
    }

    #[test]
    fn test_data_loss_protection_keeps_link_in_markdown() {
        let d = SchemaDescription::default().unmodifiable_data_loss_protection();
        assert!(d.markdown_description.contains("[plan `-replace` command option]"));
        assert!(d.description.contains("[plan \"-replace\" command option]"));
    }
}
