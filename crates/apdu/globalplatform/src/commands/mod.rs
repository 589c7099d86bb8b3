//! GlobalPlatform command definitions
//!
//! Each command is a newtype over [`Command`](gpcard_apdu_core::Command) with
//! builders producing the byte layout GlobalPlatform expects. The newtypes
//! deref to the generic command and convert into it for transmission.

/// Define a command newtype with its conversions
macro_rules! gp_command {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, derive_more::Deref)]
        pub struct $name(gpcard_apdu_core::Command);

        impl $name {
            /// Unwrap into the generic command
            pub fn into_command(self) -> gpcard_apdu_core::Command {
                self.0
            }
        }

        impl From<$name> for gpcard_apdu_core::Command {
            fn from(command: $name) -> Self {
                command.0
            }
        }
    };
}

pub mod delete;
pub mod external_authenticate;
pub mod get_data;
pub mod get_status;
pub mod initialize_update;
pub mod install;
pub mod load;
pub mod put_key;
pub mod select;
pub mod set_status;
pub mod store_data;

pub use delete::DeleteCommand;
pub use external_authenticate::ExternalAuthenticateCommand;
pub use get_data::GetDataCommand;
pub use get_status::GetStatusCommand;
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
pub use install::InstallCommand;
pub use load::LoadCommand;
pub use put_key::PutKeyCommand;
pub use select::SelectCommand;
pub use set_status::SetStatusCommand;
pub use store_data::StoreDataCommand;
