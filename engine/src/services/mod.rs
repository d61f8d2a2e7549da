//! Collaborator implementations bundled with the engine

pub mod simulation;

pub use simulation::{
    default_profile, HashEmbedder, InMemoryIdeaStore, SimulatedAiProvider, StaticConfigSource,
};
