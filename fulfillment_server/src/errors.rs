use fulfillment_engine::{catalog::CatalogError, traits::MarketplaceError};
use thiserror::Error;
use vendor_tools::VendorApiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Could not load the lot configuration. {0}")]
    LotConfigError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Vendor API error. {0}")]
    VendorError(#[from] VendorApiError),
    #[error("Marketplace error. {0}")]
    MarketplaceError(#[from] MarketplaceError),
    #[error("Catalog error. {0}")]
    CatalogError(#[from] CatalogError),
}
