use crate::NodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability tags a node may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Start,
    Stop,
    Goto,
    Click,
    Fill,
    SelectOption,
    SetCheckboxState,
    AssertVisible,
    Wait,
    ExtractText,
    ExtractMultiple,
    HttpRequest,
    If,
    AdvancedCondition,
    ForEach,
}

impl NodeType {
    pub const ALL: [NodeType; 15] = [
        NodeType::Start,
        NodeType::Stop,
        NodeType::Goto,
        NodeType::Click,
        NodeType::Fill,
        NodeType::SelectOption,
        NodeType::SetCheckboxState,
        NodeType::AssertVisible,
        NodeType::Wait,
        NodeType::ExtractText,
        NodeType::ExtractMultiple,
        NodeType::HttpRequest,
        NodeType::If,
        NodeType::AdvancedCondition,
        NodeType::ForEach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::Stop => "stop",
            NodeType::Goto => "goto",
            NodeType::Click => "click",
            NodeType::Fill => "fill",
            NodeType::SelectOption => "selectOption",
            NodeType::SetCheckboxState => "setCheckboxState",
            NodeType::AssertVisible => "assertVisible",
            NodeType::Wait => "wait",
            NodeType::ExtractText => "extractText",
            NodeType::ExtractMultiple => "extractMultiple",
            NodeType::HttpRequest => "httpRequest",
            NodeType::If => "if",
            NodeType::AdvancedCondition => "advancedCondition",
            NodeType::ForEach => "forEach",
        }
    }

    /// Ports this type consults before the generic fallback order, if any
    pub fn branch_ports(&self) -> Option<[&'static str; 2]> {
        match self {
            NodeType::If | NodeType::AdvancedCondition => Some(["then", "out"]),
            NodeType::ForEach => Some(["next", "out"]),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NodeError::UnknownNodeType(s.to_string()))
    }
}
