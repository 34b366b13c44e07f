pub mod http_client_factory;
pub mod llm;
pub mod object_store;
pub mod ocr;
pub mod whatsapp;

pub use http_client_factory::HttpClientFactory;
pub use llm::HttpLlmExtractor;
pub use object_store::HttpObjectStore;
pub use ocr::HttpOcrProvider;
pub use whatsapp::HttpWhatsAppSender;
