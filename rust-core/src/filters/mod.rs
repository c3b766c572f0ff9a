//! FIR design, FFT-based FIR engines and IIR filtering

pub mod attenuation;
pub mod design;
pub mod direct;
pub mod iir;
pub mod overlap_add;
pub mod plan;
pub mod windows;

pub use attenuation::{verify_attenuation, AttenuationWarning};
pub use design::{adjust_length_for_nyquist, firwin2, FrequencyResponseSpec};
pub use direct::DirectFFTFilterEngine;
pub use iir::{IirBand, IirFilter, IirParams, SecondOrderSection};
pub use overlap_add::OverlapAddEngine;
pub use plan::ExecutionPlan;
pub use windows::{generate_window, WindowType};
