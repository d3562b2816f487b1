pub mod extractor;
pub mod fetcher;
pub mod telegram;

pub use extractor::{ExtractorConfig, HtmlProductExtractor, LinkStrategy, StockSignal};
pub use fetcher::ReqwestFetcher;
pub use telegram::{TelegramConfig, TelegramNotifier};
