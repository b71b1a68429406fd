use crate::gateway::Endpoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `options-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum GatewayError {
    #[error("network error requesting {endpoint}: {message}")]
    Network { endpoint: Endpoint, message: String },

    #[error("server responded with status {status} to {endpoint}")]
    Server { endpoint: Endpoint, status: u16 },

    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: Endpoint, message: String },

    #[error("failed to build HTTP client: {0}")]
    Config(String),
}

impl GatewayError {
    /// Classify a [`reqwest::Error`] raised while talking to `endpoint`.
    ///
    /// Status errors map to [`GatewayError::Server`], body decoding errors to
    /// [`GatewayError::Decode`], and everything else (connect failures, timeouts,
    /// dropped connections) to [`GatewayError::Network`].
    pub fn classify(endpoint: Endpoint, error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            Self::Server {
                endpoint,
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            Self::Decode {
                endpoint,
                message: error.to_string(),
            }
        } else {
            Self::Network {
                endpoint,
                message: error.to_string(),
            }
        }
    }

    /// The endpoint the failing request was issued against, if any.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            GatewayError::Network { endpoint, .. }
            | GatewayError::Server { endpoint, .. }
            | GatewayError::Decode { endpoint, .. } => Some(*endpoint),
            GatewayError::Config(_) => None,
        }
    }

    /// Determine if the failure originated from the server side of the connection
    /// (an error status or a body that does not match the API contract).
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_server_fault(&self) -> bool {
        match self {
            GatewayError::Server { .. } | GatewayError::Decode { .. } => true,
            _ => false,
        }
    }

    /// Determine if the failure was a transport problem (no response received).
    pub fn is_network(&self) -> bool {
        matches!(self, GatewayError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_fault_classification() {
        struct TestCase {
            input: GatewayError,
            expected_server_fault: bool,
            expected_network: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: connect failure is a network error
                input: GatewayError::Network {
                    endpoint: Endpoint::ChartData,
                    message: "connection refused".to_string(),
                },
                expected_server_fault: false,
                expected_network: true,
            },
            TestCase {
                // TC1: non-2xx is a server fault
                input: GatewayError::Server {
                    endpoint: Endpoint::LatestData,
                    status: 502,
                },
                expected_server_fault: true,
                expected_network: false,
            },
            TestCase {
                // TC2: malformed body is a server fault
                input: GatewayError::Decode {
                    endpoint: Endpoint::Status,
                    message: "expected value at line 1 column 1".to_string(),
                },
                expected_server_fault: true,
                expected_network: false,
            },
            TestCase {
                // TC3: client construction failure is neither
                input: GatewayError::Config("no TLS backend".to_string()),
                expected_server_fault: false,
                expected_network: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(
                test.input.is_server_fault(),
                test.expected_server_fault,
                "TC{} failed (server fault)",
                index
            );
            assert_eq!(
                test.input.is_network(),
                test.expected_network,
                "TC{} failed (network)",
                index
            );
        }
    }

    #[test]
    fn test_gateway_error_display_names_endpoint() {
        let error = GatewayError::Server {
            endpoint: Endpoint::TriggerCollection,
            status: 503,
        };

        assert_eq!(
            error.to_string(),
            "server responded with status 503 to POST /api/trigger-collection"
        );
        assert_eq!(error.endpoint(), Some(Endpoint::TriggerCollection));
    }
}
