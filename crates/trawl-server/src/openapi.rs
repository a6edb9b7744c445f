use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trawl API",
        version = "0.1.0",
        description = "Scraping job orchestration: batch scrapes, tracked jobs and AI analysis."
    ),
    paths(
        crate::routes::scrape,
        crate::routes::start_job,
        crate::routes::list_jobs,
        crate::routes::get_job,
        crate::routes::delete_job,
        crate::routes::analyze_job,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::ScrapeRequest,
        crate::dto::ScrapingResultResponse,
        crate::dto::ResultMetadataResponse,
        crate::dto::StartJobRequest,
        crate::dto::StartJobResponse,
        crate::dto::JobResponse,
        crate::dto::JobListResponse,
        crate::dto::AnalyzeRequest,
        crate::dto::AnalysisResponse,
        crate::dto::SentimentResponse,
        crate::dto::EntityResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "scrape", description = "Synchronous batch scraping"),
        (name = "jobs", description = "Tracked scrape jobs and AI analysis"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
