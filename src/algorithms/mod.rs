pub mod broadening;
pub mod moments;
pub mod spectral;

pub use broadening::{broaden, cumulative_weight, linspace, trapezoid};
pub use moments::{MomentsRow, RawMoments, average_over_seeds, thermodynamic_moments};
pub use spectral::{AssemblyOptions, SpectralWeights, assemble_spectral_weights};
