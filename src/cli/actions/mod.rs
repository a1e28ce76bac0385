pub mod login;
pub mod logout;
pub mod status;

/// What the CLI was asked to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Login,
    Status,
    Logout,
}
