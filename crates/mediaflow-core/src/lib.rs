//! mediaflow-core
//!
//! Lifecycle driver for asynchronous generative-media jobs: submit a task to
//! a provider, poll it to a terminal state, restart failed cycles within a
//! budget and fall back to an alternate provider.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, status, request, outcome, policy, poll, decision, errors）
//! - **ports**: 抽象化レイヤー（TaskProvider, Clock, RateLimiter, CredentialStore, MediaUploader, ProgressObserver, IdGenerator）
//! - **app**: アプリケーションロジック（poller, orchestrator, fallback, service, builder）
//! - **impls**: 実装（HttpTaskProvider, ScriptedProvider, SpacingRateLimiter）
//! - **config**: JSON 設定（DriverConfig）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
