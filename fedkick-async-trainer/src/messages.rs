use fedkick_core::{Identity, Model};

/// Messages that the training task receives.
#[derive(Debug)]
pub enum TrainerMessage {
    /// A model snapshot fetched from the server.
    ModelParams {
        /// Owner of the model.
        who: Identity,
        /// The snapshot.
        model: Model,
    },
}
