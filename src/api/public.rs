//! Public API types, re-exported from each route

pub mod auth {
    pub use crate::api::routes::auth::public::*;
}

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}

pub mod profiles {
    pub use crate::api::routes::profiles::public::*;
}
