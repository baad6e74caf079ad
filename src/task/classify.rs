/// Parameter classification
///
/// Splits a signature into input paths, output paths and behavior flags.
/// Output detection runs first, so `output_path` is an output even though it
/// also contains "path".
use tracing::debug;

use super::signature::{Signature, TypeTag};

const OUTPUT_WORDS: &[&str] = &["output"];
const INPUT_WORDS: &[&str] = &["input", "path", "file"];

/// Role of a parameter in skip decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    Input,
    Output,
    Behavior,
    /// `_`-prefixed, ignored for fingerprinting
    Insignificant,
}

/// Result of classifying a signature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub input_params: Vec<String>,
    pub output_params: Vec<String>,
    pub behavior_params: Vec<String>,
}

impl Classification {
    pub fn role_of(&self, name: &str) -> ParamRole {
        let has = |list: &[String]| list.iter().any(|p| p == name);
        if has(&self.output_params) {
            ParamRole::Output
        } else if has(&self.input_params) {
            ParamRole::Input
        } else if has(&self.behavior_params) {
            ParamRole::Behavior
        } else {
            ParamRole::Insignificant
        }
    }

    pub fn has_outputs(&self) -> bool {
        !self.output_params.is_empty()
    }
}

/// Classify every parameter of `signature`
pub fn classify(signature: &Signature) -> Classification {
    let mut classification = Classification::default();

    for param in signature.params() {
        let name = param.name();
        let tag = param.tag();
        if looks_like(name, tag, &TypeTag::OutputPath, OUTPUT_WORDS) {
            classification.output_params.push(name.to_string());
        } else if looks_like(name, tag, &TypeTag::InputPath, INPUT_WORDS) {
            classification.input_params.push(name.to_string());
        } else if !param.is_insignificant() {
            classification.behavior_params.push(name.to_string());
        }
    }

    debug!(
        inputs = ?classification.input_params,
        outputs = ?classification.output_params,
        flags = ?classification.behavior_params,
        "classified parameters"
    );

    classification
}

/// Tag match, or a name match for names not starting with `_`
fn looks_like(name: &str, tag: Option<&TypeTag>, marker: &TypeTag, words: &[&str]) -> bool {
    if tag.is_some_and(|t| t.contains(marker)) {
        return true;
    }
    if name.starts_with('_') {
        return false;
    }
    let lower = name.to_lowercase();
    words.iter().any(|w| lower.contains(w))
}
