pub mod redis_service;
pub mod search_service;
