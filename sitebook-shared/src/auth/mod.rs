/// Authentication and authorization
///
/// - [`password`]: Argon2id password hashing and policy
/// - [`jwt`]: Access/refresh token issue and validation
/// - [`middleware`]: Bearer-token extraction into [`middleware::AuthContext`]
/// - [`authorization`]: Role checks against organization memberships

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
