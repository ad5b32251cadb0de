// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod middleware {
    pub use crate::middleware::*;
}

pub mod routes {
    pub use crate::routes::*;
}
