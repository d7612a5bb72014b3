//! Progressive "typewriter" reveal of streamed answers: variant generation,
//! highlight diffs between variants, content sizing and the timed sequencer
//! that plays them.

pub mod diff;
pub mod markup;
pub mod measure;
pub mod sequencer;
pub mod variants;

pub use diff::{diff, diff_html, render_highlight, DiffSegment};
pub use measure::{measure_render_size, ProfileId, RenderSize, StyleProfile};
pub use sequencer::{
    RevealDriver, RevealFrame, RevealMachine, RevealState, RevealStep, RevealTiming,
};
pub use variants::{build_variants, RevealVariant, LOADING_PLACEHOLDER};
