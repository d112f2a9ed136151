//! Data models for Media Frame entities.
//!
//! This module contains the request and response types exchanged with the
//! backend, including:
//!
//! - `TokenPair`, `RefreshedTokens`: credentials issued by the auth endpoints
//! - `RegisterRequest` and the password-reset forms, with input validation
//! - `UserProfile`, `Tier`, `Plan`: account and subscription data
//! - `ProcessorAction`, `ProcessorRequest`, `ProcessorOutput`: the processing console
//! - `Payment`, `CheckoutSession`, `PaymentConfirmation`: billing records

pub mod account;
pub mod payment;
pub mod processor;
pub mod tokens;
pub mod validation;

pub use account::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, Plan, RegisterRequest,
    ResetPasswordRequest, Tier, UserProfile, PLANS,
};
pub use payment::{CheckoutSession, Payment, PaymentConfirmation, PaymentStatus};
pub use processor::{
    ProcessorAction, ProcessorOutput, ProcessorRequest, ProcessorUsage, SpeakerSegment,
    SpeechInfo,
};
pub use tokens::{RefreshedTokens, TokenPair};
pub use validation::ValidationError;
