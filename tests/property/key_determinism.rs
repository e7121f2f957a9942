//! Invariant 7: key determinism. Two requests with identical
//! (endpoint-pattern, scope, scoped-identifier) always produce identical
//! rate-limit keys, and changing any one of the three changes the key.

use admission_ratelimiter::{derive_key, KeyInput, Scope};
use proptest::prelude::*;

fn scope_strategy() -> impl Strategy<Value = Scope> {
    prop_oneof![
        Just(Scope::Global),
        Just(Scope::PerIp),
        Just(Scope::PerUser),
        Just(Scope::PerSession),
        Just(Scope::PerClient),
        Just(Scope::Custom),
    ]
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,16}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn identical_inputs_always_produce_the_same_key(
        endpoint in "/api/v1/[a-z]{1,10}",
        scope in scope_strategy(),
        remote_addr in identifier_strategy(),
        user_id in identifier_strategy(),
        session_id in identifier_strategy(),
        client_id in identifier_strategy(),
    ) {
        let input = KeyInput {
            remote_addr: Some(remote_addr.as_str()),
            user_id: Some(user_id.as_str()),
            session_id: Some(session_id.as_str()),
            client_id: Some(client_id.as_str()),
            custom_identifier: None,
        };
        let k1 = derive_key(&endpoint, scope, &input);
        let k2 = derive_key(&endpoint, scope, &input);
        prop_assert_eq!(k1, k2);
    }

    #[test]
    fn changing_the_scoped_identifier_changes_the_key(
        endpoint in "/api/v1/[a-z]{1,10}",
        user_a in identifier_strategy(),
        user_b in identifier_strategy(),
    ) {
        prop_assume!(user_a != user_b);
        let input_a = KeyInput { remote_addr: None, user_id: Some(user_a.as_str()), session_id: None, client_id: None, custom_identifier: None };
        let input_b = KeyInput { remote_addr: None, user_id: Some(user_b.as_str()), session_id: None, client_id: None, custom_identifier: None };
        let key_a = derive_key(&endpoint, Scope::PerUser, &input_a);
        let key_b = derive_key(&endpoint, Scope::PerUser, &input_b);
        prop_assert_ne!(key_a, key_b);
    }

    #[test]
    fn global_scope_is_blind_to_identity(
        endpoint in "/api/v1/[a-z]{1,10}",
        user_a in identifier_strategy(),
        user_b in identifier_strategy(),
    ) {
        let input_a = KeyInput { remote_addr: None, user_id: Some(user_a.as_str()), session_id: None, client_id: None, custom_identifier: None };
        let input_b = KeyInput { remote_addr: None, user_id: Some(user_b.as_str()), session_id: None, client_id: None, custom_identifier: None };
        let key_a = derive_key(&endpoint, Scope::Global, &input_a);
        let key_b = derive_key(&endpoint, Scope::Global, &input_b);
        prop_assert_eq!(key_a, key_b);
    }
}
