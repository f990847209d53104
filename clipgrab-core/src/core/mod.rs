pub mod chain;
pub mod downloader;
pub mod filename;
pub mod formats;
pub mod http_client;
pub mod pipeline;
pub mod redirect;
pub mod registry;
pub mod scrape;
pub mod url_parser;
pub mod ytdlp;
