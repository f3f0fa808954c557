use crate::gemini::generate_content::response::GenerateContentResponse;

/// Each SSE chunk of `streamGenerateContent` carries the same shape as the
/// non-streaming response.
pub type StreamGenerateContentResponse = GenerateContentResponse;
