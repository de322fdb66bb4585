use serde::{Deserialize, Serialize};

use crate::category::CategoryColor;
use crate::strings::SharedStr;

/// Raw numbers for one call node, relative values being fractions of the
/// tree's root total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNodeData {
    pub func_name: SharedStr,
    pub total: f64,
    pub total_relative: f64,
    #[serde(rename = "self")]
    pub self_time: f64,
    pub self_relative: f64,
}

/// Everything a call-tree row needs to render, already formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallNodeDisplayData {
    pub total: String,
    pub total_with_unit: String,
    pub total_percent: String,
    #[serde(rename = "self")]
    pub self_time: String,
    pub self_with_unit: String,
    pub name: SharedStr,
    /// Origin of the function: library, file and line, or host.
    pub lib: String,
    /// True for label frames that belong to no resource.
    pub is_frame_label: bool,
    pub category_name: String,
    pub category_color: CategoryColor,
    pub icon: Option<OriginIcon>,
    pub aria_label: String,
    pub badge: Option<InliningBadge>,
}

/// Icon shown next to a function, derived from its resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OriginIcon {
    /// Favicon of the web host the function was loaded from.
    Favicon { url: String },
    /// Browser extension; `name` is the extension's resource name.
    Extension { name: String },
}

/// Annotation for call nodes whose frames were inlined by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InliningBadge {
    /// The frames merged into this node disagree on whether they were inlined.
    #[serde(rename_all = "camelCase")]
    DivergentInlining { called_function: String },
    /// All frames were inlined into the same outer native symbol.
    #[serde(rename_all = "camelCase")]
    Inlined {
        called_function: String,
        outer_function: String,
    },
}

impl InliningBadge {
    /// Short tooltip text for the badge.
    pub fn title(&self) -> String {
        match self {
            Self::DivergentInlining { called_function } => format!(
                "Some calls to {called_function} were inlined by the compiler."
            ),
            Self::Inlined {
                called_function,
                outer_function,
            } => format!(
                "Calls to {called_function} were inlined into {outer_function} by the compiler."
            ),
        }
    }
}
