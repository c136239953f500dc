//! Localized labels for the HTML document.
//!
//! The stylesheets never look strings up themselves. Instead every label
//! they need is resolved up front and appended to the intermediate document
//! as a `<moodlelabels>` element:
//!
//! ```xml
//! <moodlelabels>
//! <data name="qtype_truefalse_true"><value>True</value></data>
//! …
//! </moodlelabels>
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::ExportError;

/// (namespace, keys) of every label the stylesheets reference.
pub const LABEL_KEYS: &[(&str, &[&str])] = &[
    ("assignment", &["uploaderror", "uploadafile", "uploadfiletoobig"]),
    ("grades", &["item"]),
    (
        "moodle",
        &[
            "categoryname", "no", "yes", "feedback", "format", "formathtml", "formatmarkdown",
            "formatplain", "formattext", "grade", "question", "tags", "uploadserverlimit",
            "uploadedfile",
        ],
    ),
    (
        "qtype_calculated",
        &["pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary", "addmoreanswerblanks"],
    ),
    (
        "qtype_description",
        &["pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary"],
    ),
    (
        "qtype_essay",
        &[
            "pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary",
            "allowattachments", "graderinfo", "formateditor", "formateditorfilepicker",
            "formatmonospaced", "formatplain", "responsefieldlines", "responseformat",
            "responsetemplate", "responsetemplate_help",
        ],
    ),
    (
        "qtype_match",
        &[
            "pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary",
            "blanksforxmorequestions", "filloutthreeqsandtwoas",
        ],
    ),
    (
        "qtype_multianswer",
        &["pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary"],
    ),
    (
        "qtype_multichoice",
        &[
            "pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary",
            "answerhowmany", "answernumbering", "answersingleno", "answersingleyes", "choiceno",
            "correctfeedback", "fillouttwochoices", "incorrectfeedback",
            "partiallycorrectfeedback", "shuffleanswers",
        ],
    ),
    (
        "qtype_shortanswer",
        &[
            "pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary",
            "addmoreanswerblanks", "casesensitive", "filloutoneanswer",
        ],
    ),
    (
        "qtype_truefalse",
        &["pluginname", "pluginnameadding", "pluginnameediting", "pluginnamesummary", "false", "true"],
    ),
    (
        "question",
        &[
            "addmorechoiceblanks", "category", "combinedfeedback", "correctfeedbackdefault",
            "defaultmark", "fillincorrect", "flagged", "flagthisquestion", "generalfeedback",
            "addanotherhint", "hintn", "hintnoptions", "hinttext", "clearwrongparts",
            "penaltyforeachincorrecttry", "incorrect", "incorrectfeedbackdefault",
            "partiallycorrect", "partiallycorrectfeedbackdefault", "questions", "questionx",
            "questioncategory", "questiontext", "specificfeedback", "shownumpartscorrect",
            "shownumpartscorrectwhenfinished",
        ],
    ),
    (
        "quiz",
        &[
            "answer", "answers", "choice", "correct", "correctanswers", "defaultgrade",
            "generalfeedback", "feedback", "incorrect", "penaltyfactor", "shuffle",
        ],
    ),
    ("repository_upload", &["pluginname", "pluginname_help", "upload_error_no_file"]),
];

/// Host localization lookup.
pub trait LabelResolver {
    /// Text for `key` in `namespace`, in the export's language.
    fn resolve_label(&self, key: &str, namespace: &str) -> String;
}

/// Resolver used when the host provides no translations: every label renders
/// as `[[key]]`, the way a host marks a missing string.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackLabels;

impl LabelResolver for FallbackLabels {
    fn resolve_label(&self, key: &str, _namespace: &str) -> String {
        format!("[[{key}]]")
    }
}

/// Labels loaded from a `{ "namespace": { "key": "text" } }` JSON map.
/// Keys missing from the map fall back to [`FallbackLabels`].
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(transparent)]
pub struct MapLabels {
    namespaces: HashMap<String, HashMap<String, String>>,
}

impl MapLabels {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExportError> {
        let json = std::fs::read_to_string(path).map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&json)
            .map_err(|e| ExportError::InvalidConfig(format!("labels file {}: {e}", path.display())))
    }

    pub fn insert(&mut self, namespace: &str, key: &str, text: impl Into<String>) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), text.into());
    }
}

impl LabelResolver for MapLabels {
    fn resolve_label(&self, key: &str, namespace: &str) -> String {
        self.namespaces
            .get(namespace)
            .and_then(|keys| keys.get(key))
            .cloned()
            .unwrap_or_else(|| FallbackLabels.resolve_label(key, namespace))
    }
}

/// Build the `<moodlelabels>` element for every entry of [`LABEL_KEYS`].
pub fn labels_xml(resolver: &dyn LabelResolver) -> String {
    let mut xml = String::from("<moodlelabels>\n");
    for (namespace, keys) in LABEL_KEYS {
        for key in keys.iter() {
            let text = resolver.resolve_label(key, namespace);
            xml.push_str(&format!(
                "<data name=\"{namespace}_{key}\"><value>{}</value></data>\n",
                escape_xml_text(&text)
            ));
        }
    }
    xml.push_str("</moodlelabels>");
    xml
}

fn escape_xml_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Plugin strings ───────────────────────────────────────────────────────

static PLUGIN_STRINGS: &[(&str, &str)] = &[
    ("pluginname", "HTML review table format"),
    ("pluginname_help", "HTML review table is a format suitable for quick review of large numbers of questions."),
    ("pluginname_link", "qformat/htmltable"),
    ("htmltable", "HTML review table format"),
    ("htmltable_help", "HTML review table is a format suitable for quick review of large numbers of questions."),
    ("noquestions", "No questions to export"),
    ("templateunavailable", "XHTML template <b>$a</b> is not available"),
    ("xsltunavailable", "You need the XSLT library installed to save this HTML file"),
    ("transformationfailed", "XSLT transformation failed (<b>$a</b>)"),
    ("stylesheetunavailable", "XSLT Stylesheet <b>$a</b> is not available"),
    ("cannotopentempfile", "Cannot open temporary file <b>$a</b>"),
    ("cannotwritetotempfile", "Cannot write to temporary file <b>$a</b>"),
    ("invalidconfig", "Invalid export configuration: $a"),
    ("blockscopiedthrough", "$a question block(s) could not be cleaned and were exported unchanged"),
    ("export_type_set", "The question export type has been set to "),
];

/// English text of one of this plugin's own strings, with `arg` substituted
/// for `$a`. Unknown keys render as `[[key]]`.
pub fn plugin_string(key: &str, arg: &str) -> String {
    PLUGIN_STRINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, text)| text.replace("$a", arg))
        .unwrap_or_else(|| format!("[[{key}]]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_labels() {
        assert_eq!(FallbackLabels.resolve_label("true", "qtype_truefalse"), "[[true]]");
    }

    #[test]
    fn test_map_labels_with_fallback() {
        let labels = MapLabels::from_json(r#"{"qtype_truefalse": {"true": "Wahr"}}"#).unwrap();
        assert_eq!(labels.resolve_label("true", "qtype_truefalse"), "Wahr");
        assert_eq!(labels.resolve_label("false", "qtype_truefalse"), "[[false]]");
    }

    #[test]
    fn test_labels_xml_shape() {
        let mut labels = MapLabels::default();
        labels.insert("grades", "item", "Item & <more>");
        let xml = labels_xml(&labels);
        assert!(xml.starts_with("<moodlelabels>\n"));
        assert!(xml.ends_with("</moodlelabels>"));
        assert!(xml.contains(
            "<data name=\"grades_item\"><value>Item &amp; &lt;more&gt;</value></data>\n"
        ));
        let entries = xml.matches("<data ").count();
        let expected: usize = LABEL_KEYS.iter().map(|(_, keys)| keys.len()).sum();
        assert_eq!(entries, expected);
    }

    #[test]
    fn test_plugin_string_substitution() {
        assert_eq!(
            plugin_string("cannotopentempfile", "/tmp/m2w-1"),
            "Cannot open temporary file <b>/tmp/m2w-1</b>"
        );
        assert_eq!(plugin_string("noquestions", ""), "No questions to export");
        assert_eq!(plugin_string("nope", ""), "[[nope]]");
        assert_eq!(
            plugin_string("blockscopiedthrough", "2"),
            "2 question block(s) could not be cleaned and were exported unchanged"
        );
    }
}
