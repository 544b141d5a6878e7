//! Client-side interface bindings for the example canisters.
//!
//! One module per program variant, each with its interface descriptor,
//! its record types and a typed actor. Bindings are independent of the
//! program crates: they describe what a client expects to find on the wire.

/// Declare a typed actor wrapping `replica_client::Actor`.
macro_rules! typed_actor {
    ($name:ident, $interface:path) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            actor: ::replica_client::Actor,
        }

        impl ::replica_client::TypedActor for $name {
            fn interface() -> ::replica_api::ServiceType {
                $interface()
            }

            fn from_actor(actor: ::replica_client::Actor) -> Self {
                Self { actor }
            }

            fn actor(&self) -> &::replica_client::Actor {
                &self.actor
            }

            fn into_actor(self) -> ::replica_client::Actor {
                self.actor
            }
        }
    };
}

pub(crate) use typed_actor;

pub mod example;
pub mod migratable_v1;
pub mod migratable_v2;
pub mod migratable_v2_post;
