//! Product lookup domain: public API.
//!
//! Resolves a scanned code against an open product database. A lookup
//! never fails from the caller's point of view: anything other than a
//! recognised product is "not found", and the pipeline degrades to
//! image-only analysis.

mod openfoodfacts;

pub use openfoodfacts::{OpenFoodFactsClient, ProductContext};

use crate::capture::ProductCode;
use std::future::Future;

pub trait ProductLookup: Send + Sync {
    /// `None` covers unknown products, non-2xx responses and transport errors alike.
    fn lookup(&self, code: &ProductCode) -> impl Future<Output = Option<ProductContext>> + Send;
}
