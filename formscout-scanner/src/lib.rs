pub mod assessor;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod http_driver;
pub mod locator;
pub mod poll;
pub mod readiness;
pub mod result;

#[cfg(test)]
mod testing;

pub use assessor::{CanonicalConcept, FillabilityResult, FillabilityStatus, assess_fillability};
pub use driver::{BrowserDriver, DriverLauncher, LaunchOptions, LoadState, PageHandle};
pub use error::ScanError;
pub use http_driver::{HttpDriver, HttpLauncher};
pub use locator::{ContactKeywords, Language, LocatorOptions, find_contact_page};
pub use readiness::{ReadinessConfig, wait_for_dynamic_content};
pub use result::{ContactPageResult, DynamicContentResult, FieldKind, FormField, FormStructure};
