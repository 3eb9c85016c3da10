// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::time::current_unix;
use crate::domain::constants::{SWAP_DEADLINE_SECS, V3_SWAP_EXACT_IN};
use crate::network::contracts::UniversalRouter;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::{SolCall, SolValue};

/// One swap to be signed and dispatched. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub amount_in: U256,
    pub recipient: Address,
    pub deadline: u64,
}

impl SwapRequest {
    pub fn new(amount_in: U256, recipient: Address) -> Self {
        Self {
            amount_in,
            recipient,
            deadline: current_unix().saturating_add(SWAP_DEADLINE_SECS),
        }
    }
}

/// The fixed route every swap in a run travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRoute {
    pub router: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub pool_fee: u32,
}

/// `tokenIn ++ fee (uint24, big-endian) ++ tokenOut`, 43 bytes.
pub fn v3_path(token_in: Address, pool_fee: u32, token_out: Address) -> Vec<u8> {
    let mut path = Vec::with_capacity(43);
    path.extend_from_slice(token_in.as_slice());
    path.extend_from_slice(&pool_fee.to_be_bytes()[1..]);
    path.extend_from_slice(token_out.as_slice());
    path
}

/// Universal-router `execute` calldata for a single exact-input V3 swap.
/// `inputs[0]` carries `(recipient, amountIn, minAmountOut, path, payerIsUser)`
/// with `minAmountOut = 0` and the payer being the signing wallet.
pub fn encode_execute(route: &SwapRoute, request: &SwapRequest) -> Vec<u8> {
    let path = v3_path(route.token_in, route.pool_fee, route.token_out);
    let swap_input = (
        request.recipient,
        request.amount_in,
        U256::ZERO,
        Bytes::from(path),
        true,
    )
        .abi_encode_params();

    UniversalRouter::executeCall {
        commands: vec![V3_SWAP_EXACT_IN].into(),
        inputs: vec![swap_input.into()],
        deadline: U256::from(request.deadline),
    }
    .abi_encode()
}

pub fn swap_call(from: Address, route: &SwapRoute, request: &SwapRequest) -> TransactionRequest {
    TransactionRequest {
        from: Some(from),
        to: Some(TxKind::Call(route.router)),
        value: Some(U256::ZERO),
        input: TransactionInput::new(encode_execute(route, request).into()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::DEFAULT_POOL_FEE;

    fn route() -> SwapRoute {
        SwapRoute {
            router: Address::from([9u8; 20]),
            token_in: Address::from([1u8; 20]),
            token_out: Address::from([2u8; 20]),
            pool_fee: DEFAULT_POOL_FEE,
        }
    }

    #[test]
    fn path_packs_tokens_around_uint24_fee() {
        let path = v3_path(
            Address::from([1u8; 20]),
            DEFAULT_POOL_FEE,
            Address::from([2u8; 20]),
        );
        assert_eq!(path.len(), 43);
        assert_eq!(&path[..20], &[1u8; 20]);
        // 500 as a big-endian uint24
        assert_eq!(&path[20..23], &[0x00, 0x01, 0xf4]);
        assert_eq!(&path[23..], &[2u8; 20]);
    }

    #[test]
    fn deadline_is_twenty_minutes_out() {
        let before = current_unix();
        let request = SwapRequest::new(U256::from(1u64), Address::ZERO);
        let after = current_unix();

        assert!(request.deadline >= before + SWAP_DEADLINE_SECS);
        assert!(request.deadline <= after + SWAP_DEADLINE_SECS);
    }

    #[test]
    fn execute_calldata_carries_command_and_deadline() {
        let request = SwapRequest {
            amount_in: U256::from(1_000_000u64),
            recipient: Address::from([7u8; 20]),
            deadline: 1_700_000_000,
        };
        let calldata = encode_execute(&route(), &request);

        assert_eq!(hex::encode(&calldata[..4]), "3593564c");
        let decoded = UniversalRouter::executeCall::abi_decode(&calldata).expect("decode execute");
        assert_eq!(decoded.commands.as_ref(), &[V3_SWAP_EXACT_IN]);
        assert_eq!(decoded.inputs.len(), 1);
        assert_eq!(decoded.deadline, U256::from(1_700_000_000u64));

        // inputs[0] decodes back to the swap tuple
        let (recipient, amount_in, min_out, path, payer_is_user) =
            <(Address, U256, U256, Bytes, bool)>::abi_decode_params(&decoded.inputs[0])
                .expect("decode swap input");
        assert_eq!(recipient, request.recipient);
        assert_eq!(amount_in, request.amount_in);
        assert_eq!(min_out, U256::ZERO);
        assert_eq!(path.len(), 43);
        assert!(payer_is_user);
    }

    #[test]
    fn swap_call_targets_router_with_zero_value() {
        let request = SwapRequest::new(U256::from(5u64), Address::from([7u8; 20]));
        let call = swap_call(Address::from([3u8; 20]), &route(), &request);

        assert_eq!(call.to, Some(TxKind::Call(route().router)));
        assert_eq!(call.value, Some(U256::ZERO));
        assert!(call.input.input().is_some());
    }
}
