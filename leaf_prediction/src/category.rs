use serde::{Deserialize, Serialize};
use std::fmt;

/// Classes the grape leaf model was trained on. Discriminants are the
/// positions in the model's output vector and must follow the training
/// label order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafCategory {
    #[serde(rename = "Black Measles Disease")]
    BlackMeasles = 0,
    #[serde(rename = "Black Rot Disease")]
    BlackRot = 1,
    #[serde(rename = "Healthy")]
    Healthy = 2,
    #[serde(rename = "Leaf Blight Disease")]
    LeafBlight = 3,
}

impl LeafCategory {
    pub const COUNT: usize = 4;

    pub const ALL: [LeafCategory; Self::COUNT] = [
        LeafCategory::BlackMeasles,
        LeafCategory::BlackRot,
        LeafCategory::Healthy,
        LeafCategory::LeafBlight,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            LeafCategory::BlackMeasles => "Black Measles Disease",
            LeafCategory::BlackRot => "Black Rot Disease",
            LeafCategory::Healthy => "Healthy",
            LeafCategory::LeafBlight => "Leaf Blight Disease",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.label() == label)
    }

    pub fn is_healthy(self) -> bool {
        self == LeafCategory::Healthy
    }
}

// ALL[i] must be the variant whose output index is i.
const _: () = {
    let mut i = 0;
    while i < LeafCategory::COUNT {
        assert!(LeafCategory::ALL[i] as usize == i);
        i += 1;
    }
};

impl fmt::Display for LeafCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
