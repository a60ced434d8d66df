//! Model type definitions using bitflags for endpoint support.
//!
//! Defines [`ModelType`] using bitflags to represent which endpoints a model
//! can support, and [`Endpoint`] for routing decisions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Copy, Debug, Default, Clone, Eq, PartialEq, Hash)]
    pub struct ModelType: u16 {
        /// Claude-style Messages API (/v1/messages)
        const MESSAGES    = 1 << 0;
        /// OpenAI Chat Completions API (/v1/chat/completions)
        const CHAT        = 1 << 1;
        /// OpenAI Responses/Codex API (/v1/responses)
        const RESPONSES   = 1 << 2;
        /// Vision/multimodal support (images in input)
        const VISION      = 1 << 3;
        /// Tool/function calling support
        const TOOLS       = 1 << 4;
        /// Reasoning/thinking support
        const REASONING   = 1 << 5;

        /// Standard LLM: all three protocols + tools
        const LLM = Self::MESSAGES.bits() | Self::CHAT.bits()
                  | Self::RESPONSES.bits() | Self::TOOLS.bits();

        /// Vision-capable LLM: LLM + vision
        const VISION_LLM = Self::LLM.bits() | Self::VISION.bits();

        /// Reasoning LLM: LLM + reasoning
        const REASONING_LLM = Self::LLM.bits() | Self::REASONING.bits();

        /// Full-featured LLM: all text generation capabilities
        const FULL_LLM = Self::VISION_LLM.bits() | Self::REASONING.bits();
    }
}

/// Mapping of individual capability flags to their names.
const CAPABILITY_NAMES: &[(ModelType, &str)] = &[
    (ModelType::MESSAGES, "messages"),
    (ModelType::CHAT, "chat"),
    (ModelType::RESPONSES, "responses"),
    (ModelType::VISION, "vision"),
    (ModelType::TOOLS, "tools"),
    (ModelType::REASONING, "reasoning"),
];

impl ModelType {
    /// Check if this model type supports the Claude-style Messages endpoint
    #[inline]
    pub fn supports_messages(&self) -> bool {
        self.contains(Self::MESSAGES)
    }

    /// Check if this model type supports the chat completions endpoint
    #[inline]
    pub fn supports_chat(&self) -> bool {
        self.contains(Self::CHAT)
    }

    /// Check if this model type supports the responses endpoint
    #[inline]
    pub fn supports_responses(&self) -> bool {
        self.contains(Self::RESPONSES)
    }

    /// Check if this model type supports vision/multimodal input
    #[inline]
    pub fn supports_vision(&self) -> bool {
        self.contains(Self::VISION)
    }

    /// Check if this model type supports tool/function calling
    #[inline]
    pub fn supports_tools(&self) -> bool {
        self.contains(Self::TOOLS)
    }

    /// Check if this model type supports reasoning/thinking
    #[inline]
    pub fn supports_reasoning(&self) -> bool {
        self.contains(Self::REASONING)
    }

    /// Check if this model type supports a given endpoint
    pub fn supports_endpoint(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Messages => self.supports_messages(),
            Endpoint::Chat => self.supports_chat(),
            Endpoint::Responses => self.supports_responses(),
            Endpoint::Models => true,
        }
    }

    /// Convert to a list of supported capability names
    pub fn as_capability_names(&self) -> Vec<&'static str> {
        let mut result = Vec::with_capacity(CAPABILITY_NAMES.len());
        for &(flag, name) in CAPABILITY_NAMES {
            if self.contains(flag) {
                result.push(name);
            }
        }
        result
    }

    /// Check if this is an LLM (supports at least one of the three protocols)
    #[inline]
    pub fn is_llm(&self) -> bool {
        self.supports_messages() || self.supports_chat() || self.supports_responses()
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.as_capability_names();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

impl Serialize for ModelType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let names = self.as_capability_names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ModelType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct ModelTypeVisitor;

        impl<'de> de::Visitor<'de> for ModelTypeVisitor {
            type Value = ModelType;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an array of capability names or a u16 bitfield")
            }

            // Backward compat: accept numeric u16 bitfield
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ModelType, E> {
                let bits = u16::try_from(v)
                    .map_err(|_| E::custom(format!("ModelType bits out of u16 range: {}", v)))?;
                ModelType::from_bits(bits)
                    .ok_or_else(|| E::custom(format!("invalid ModelType bits: {}", bits)))
            }

            // New format: array of capability name strings
            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<ModelType, A::Error> {
                let mut model_type = ModelType::empty();
                while let Some(name) = seq.next_element::<String>()? {
                    let flag = CAPABILITY_NAMES
                        .iter()
                        .find(|(_, n)| *n == name.as_str())
                        .map(|(f, _)| *f)
                        .ok_or_else(|| {
                            de::Error::custom(format!("unknown ModelType capability: {}", name))
                        })?;
                    model_type |= flag;
                }
                Ok(model_type)
            }
        }

        deserializer.deserialize_any(ModelTypeVisitor)
    }
}

/// Endpoint types for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Claude-style Messages endpoint (/v1/messages)
    Messages,
    /// Chat completions endpoint (/v1/chat/completions)
    Chat,
    /// Responses endpoint (/v1/responses)
    Responses,
    /// Models listing endpoint (/v1/models)
    Models,
}

impl Endpoint {
    /// Get the URL path for this endpoint
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Messages => "/v1/messages",
            Endpoint::Chat => "/v1/chat/completions",
            Endpoint::Responses => "/v1/responses",
            Endpoint::Models => "/v1/models",
        }
    }

    /// Parse an endpoint from a URL path
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        match path {
            "/v1/messages" => Some(Endpoint::Messages),
            "/v1/chat/completions" => Some(Endpoint::Chat),
            "/v1/responses" => Some(Endpoint::Responses),
            "/v1/models" => Some(Endpoint::Models),
            _ => None,
        }
    }

    /// Get the required ModelType flag for this endpoint
    pub fn required_capability(&self) -> Option<ModelType> {
        match self {
            Endpoint::Messages => Some(ModelType::MESSAGES),
            Endpoint::Chat => Some(ModelType::CHAT),
            Endpoint::Responses => Some(ModelType::RESPONSES),
            Endpoint::Models => None,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Messages => write!(f, "messages"),
            Endpoint::Chat => write!(f, "chat"),
            Endpoint::Responses => write!(f, "responses"),
            Endpoint::Models => write!(f, "models"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_round_trips() {
        for ep in [Endpoint::Messages, Endpoint::Chat, Endpoint::Responses, Endpoint::Models] {
            assert_eq!(Endpoint::from_path(ep.path()), Some(ep));
        }
    }

    #[test]
    fn model_type_serializes_as_name_array() {
        let mt = ModelType::MESSAGES | ModelType::TOOLS;
        let json = serde_json::to_value(&mt).unwrap();
        assert_eq!(json, serde_json::json!(["messages", "tools"]));
        let back: ModelType = serde_json::from_value(json).unwrap();
        assert_eq!(back, mt);
    }
}
