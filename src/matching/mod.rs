/// Template matching
///
/// Scores a captured frame against a group of reference icons and decides
/// whether the group is present.
///
/// ## Architecture
///
/// ```text
/// MatchEngine::evaluate
///   ├── degenerate checks (no frame / no templates / size / contrast)
///   ├── per template, over every window offset:
///   │     ├── color channel: masked RMS difference on raw pixels
///   │     └── shape channel: masked NCC on contrast-stretched luma
///   └── FusionTuning::fuse → best template wins → MatchOutcome
/// ```
pub mod engine;
pub mod fusion;
pub mod outcome;

pub use engine::MatchEngine;
pub use fusion::FusionTuning;
pub use outcome::MatchOutcome;
