use miette::Diagnostic;
use thiserror::Error;

/// Failure talking to the Compute Engine REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response for {context}: {message}")]
    Decode { context: String, message: String },

    #[error("invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("could not obtain an access token: {message}")]
    Auth { message: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum GcexError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("failed to obtain credentials: {message}")]
    Credentials {
        message: String,
        #[help]
        remediation: String,
    },

    #[error("failed to create Compute client: {message}")]
    #[diagnostic(help("make sure the Compute Engine API is enabled in your project"))]
    ClientSetup { message: String },

    #[error("failed to list instances in project {project}")]
    Listing {
        project: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    #[diagnostic(code(gcex::api))]
    Api(#[from] ApiError),

    #[error("file {path} not found; export the instance list first")]
    ExportMissing { path: String },

    #[error("failed to parse {path}: {message}")]
    ExportParse { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    ExportWrite { path: String, message: String },

    #[error("no matching instances found between {path} and project {project}")]
    NoMatches { path: String, project: String },

    #[error("instance {name} has no disks")]
    NoDisks { name: String },

    #[error("instance '{name}' not found in zone {zone}")]
    UnknownInstance { name: String, zone: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("interrupted")]
    Interrupted,
}
