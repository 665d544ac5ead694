pub mod pattern_classifier;

pub use pattern_classifier::{PatternClassifier, Rule, RULES};
