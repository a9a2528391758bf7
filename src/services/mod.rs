pub mod auth_service;
pub mod cache;
pub mod crawler;

pub use auth_service::{AuthResponse, AuthService, AuthServiceError};
pub use cache::{PageCache, HOME_PAGE_KEY};
pub use crawler::{crawl, ApartmentItem, CityWohnenSpider, CrawlError, CrawlSummary};
