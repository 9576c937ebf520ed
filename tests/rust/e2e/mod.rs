//! End-to-end test target: requests driven through the assembled
//! router, down the federation layer and back out as HTTP responses.

mod http_api_tests;
