mod accounts;
mod common;
mod routing;
