//! Stateless request/response/stream transforms between dialect pairs, plus
//! the dialect-agnostic middleware surface (`middleware::transform_request`,
//! `transform_response`, streaming and usage accounting) that the engine
//! actually calls.

pub mod count_tokens;
pub mod generate_content;
pub mod get_model;
pub mod list_models;
pub mod middleware;
pub mod stream2nostream;

pub use middleware::{
    CountTokensRequest, CountTokensResponse, GenerateContentRequest, GenerateContentResponse,
    ModelGetRequest, ModelGetResponse, ModelListRequest, ModelListResponse, Op, Proto, Request,
    Response, StreamEvent, StreamFormat, TransformContext, TransformError, stream_format,
    transform_request, transform_response,
};
pub use middleware::{NostreamToStream, StreamToNostream, StreamTransformer};
pub use middleware::{
    CountTokensFn, OutputAccumulator, UsageAccumulator, UsageError, UsageSummary,
    fallback_usage_with_count_tokens, output_for_counting, usage_from_response,
};
