// handlers/mod.rs - Route handlers grouped by caller
//
// public      no session        /, /health, /api/categories, /api/careers, /api/payments
// session     any role          /api/auth/*
// user        user role         /api/user/*
// employee    employee role     /api/employee/*
// field_exec  field-exec role   /api/field-exec/*
// admin       admin role        /api/admin/*
//
// Login (code request and verification) is open on every role's prefix.

pub mod admin;
pub mod employee;
pub mod field_exec;
pub mod public;
pub mod session;
pub mod user;
