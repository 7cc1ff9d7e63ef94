//! Global Constants
//!
//! Centralized defaults for the resilience core.
//! Every tunable here is also surfaced through [`crate::config::Config`].

/// AI gateway constants
pub mod ai {
    /// Per-provider request timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Fraction of the daily limit at which a provider marks itself exhausted
    pub const EXHAUSTION_RATIO: f64 = 0.9;

    /// Default generation ceiling shared by all remote backends
    pub const DEFAULT_MAX_TOKENS: u32 = 100;

    /// Default sampling temperature
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;

    /// Daily limit reported by the simulation backend
    pub const SIMULATION_DAILY_LIMIT: u64 = 999_999;

    pub mod groq {
        pub const API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
        pub const MODEL: &str = "llama-3.1-8b-instant";
        pub const DAILY_LIMIT: u64 = 10_000;
    }

    pub mod gemini {
        pub const API_URL: &str =
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
        pub const MODEL: &str = "gemini-2.0-flash";
        pub const DAILY_LIMIT: u64 = 1_500;
    }

    pub mod huggingface {
        pub const API_URL: &str =
            "https://api-inference.huggingface.co/models/microsoft/DialoGPT-small";
        pub const MODEL: &str = "microsoft/DialoGPT-small";
        pub const DAILY_LIMIT: u64 = 1_000;
    }
}

/// Rate governor constants
pub mod rate_limit {
    /// Requests admitted per identity in any trailing 60 seconds
    pub const PER_MINUTE: u32 = 5;

    /// Requests admitted per identity per calendar day
    pub const PER_DAY: u32 = 50;

    /// Width of the sliding window (seconds)
    pub const WINDOW_SECS: i64 = 60;

    /// Interval between background sweeps (seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

    /// Idle records older than this are reclaimed by the sweep (hours)
    pub const RETENTION_HOURS: i64 = 24;

    /// Length of the anonymous fingerprint in hex characters
    pub const FINGERPRINT_LEN: usize = 16;
}

/// Quote source constants
pub mod quotes {
    pub const BASE_URL: &str = "https://mis.twse.com.tw/stock/api/getStockInfo.jsp";

    /// Upstream limit on symbols per request
    pub const CHUNK_SIZE: usize = 20;

    /// Pause between consecutive chunks (milliseconds)
    pub const CHUNK_DELAY_MS: u64 = 1_000;

    /// Quote request timeout (seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 10;

    /// Upper bound on the symbol universe read per cycle
    pub const UNIVERSE_CAP: usize = 1_000;

    /// `rtcode` value of a successful envelope
    pub const SUCCESS_CODE: &str = "0000";

    /// Placeholder the upstream uses for "no data"
    pub const NO_DATA: &str = "--";

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
    pub const ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";
    pub const ACCEPT_LANGUAGE: &str = "zh-TW,zh;q=0.9,en;q=0.8";
    pub const REFERER: &str = "https://mis.twse.com.tw/";
}

/// Market calendar constants
pub mod market {
    pub const TIMEZONE: &str = "Asia/Taipei";

    /// Session open, local venue time (HH:MM)
    pub const SESSION_OPEN: &str = "09:00";

    /// Session close, local venue time (HH:MM), inclusive
    pub const SESSION_CLOSE: &str = "13:30";
}

/// Scheduler constants
pub mod scheduler {
    /// Period between sync ticks (seconds)
    pub const TICK_INTERVAL_SECS: u64 = 5;
}

/// Storage constants
pub mod storage {
    pub const DATABASE_PATH: &str = ".stockpulse/stockpulse.db";
}
