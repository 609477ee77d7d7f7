
use crate::config::CustomNamespace;

pub const NS_SPECIAL: i32 = -1;
pub const NS_MAIN: i32 = 0;
pub const NS_PROJECT: i32 = 4;
pub const NS_CATEGORY: i32 = 14;
pub const NS_FORM: i32 = 106;
pub const NS_CONCEPT: i32 = 108;

const CANONICAL_NAMESPACES: &[(i32, &str)] = &[
    (-2, "Media"),
    (NS_SPECIAL, "Special"),
    (1, "Talk"),
    (2, "User"),
    (3, "User talk"),
    (NS_PROJECT, "Project"),
    (5, "Project talk"),
    (6, "File"),
    (7, "File talk"),
    (8, "MediaWiki"),
    (9, "MediaWiki talk"),
    (10, "Template"),
    (11, "Template talk"),
    (12, "Help"),
    (13, "Help talk"),
    (NS_CATEGORY, "Category"),
    (15, "Category talk"),
    (102, "Property"),
    (103, "Property talk"),
    (NS_FORM, "Form"),
    (107, "Form talk"),
    (NS_CONCEPT, "Concept"),
    (109, "Concept talk"),
];

/// Namespace id/label lookup: the canonical table plus configured custom namespaces.
#[derive(Debug, Clone, Default)]
pub struct NamespaceTable {
    custom: Vec<CustomNamespace>,
}

impl NamespaceTable {
    pub fn new(custom: &[CustomNamespace]) -> Self {
        Self {
            custom: custom.to_vec(),
        }
    }

    pub fn label(&self, id: i32) -> Option<&str> {
        if id == NS_MAIN {
            return Some("");
        }
        if let Some(custom) = self.custom.iter().find(|ns| ns.id == id) {
            return Some(custom.name.as_str());
        }
        CANONICAL_NAMESPACES
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, label)| *label)
    }

    /// Resolve a namespace name; `Main` and the empty string mean namespace 0.
    pub fn id(&self, name: &str) -> Option<i32> {
        let normalized = normalize_text(name);
        if normalized.is_empty() || normalized.eq_ignore_ascii_case("Main") {
            return Some(NS_MAIN);
        }
        if let Some(custom) = self
            .custom
            .iter()
            .find(|ns| normalize_text(&ns.name).eq_ignore_ascii_case(&normalized))
        {
            return Some(custom.id);
        }
        CANONICAL_NAMESPACES
            .iter()
            .find(|(_, label)| label.eq_ignore_ascii_case(&normalized))
            .map(|(id, _)| *id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageTitle {
    pub namespace: i32,
    /// Title text without namespace prefix, spaces not underscores.
    pub text: String,
}

impl PageTitle {
    pub fn new(namespace: i32, text: &str) -> Self {
        Self {
            namespace,
            text: capitalize_first(&normalize_text(text)),
        }
    }

    /// Parse `Prefix:Text` against the namespace table; unknown prefixes stay in main.
    pub fn parse(value: &str, namespaces: &NamespaceTable) -> Option<Self> {
        let normalized = normalize_text(value);
        if normalized.is_empty() {
            return None;
        }
        if let Some((prefix, rest)) = normalized.split_once(':')
            && !prefix.trim().is_empty()
            && let Some(namespace) = namespaces.id(prefix)
            && namespace != NS_MAIN
        {
            let rest = normalize_text(rest);
            if rest.is_empty() {
                return None;
            }
            return Some(Self::new(namespace, &rest));
        }
        Some(Self::new(NS_MAIN, &normalized))
    }

    /// Database key form: spaces as underscores.
    pub fn db_key(&self) -> String {
        self.text.replace(' ', "_")
    }

    pub fn is_category(&self) -> bool {
        self.namespace == NS_CATEGORY
    }

    pub fn is_subpage(&self) -> bool {
        self.text.contains('/')
    }

    pub fn prefixed_text(&self, namespaces: &NamespaceTable) -> String {
        match namespaces.label(self.namespace) {
            Some(label) if !label.is_empty() => format!("{label}:{}", self.text),
            _ => self.text.clone(),
        }
    }
}

/// Underscores to spaces, collapsed whitespace, trimmed.
pub fn normalize_text(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_was_space = false;

    for ch in value.chars() {
        if ch.is_whitespace() || ch == '_' {
            if !previous_was_space {
                output.push(' ');
                previous_was_space = true;
            }
        } else {
            output.push(ch);
            previous_was_space = false;
        }
    }

    output.trim().to_string()
}

fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
