// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniversalRouter {
        function execute(bytes commands, bytes[] inputs, uint256 deadline) external payable;
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn router_and_token_call_selectors() {
        let execute = UniversalRouter::executeCall {
            commands: vec![0x00u8].into(),
            inputs: vec![vec![0x01u8].into()],
            deadline: U256::from(1u64),
        }
        .abi_encode();
        let approve = ERC20::approveCall {
            spender: Address::from([1u8; 20]),
            amount: U256::MAX,
        }
        .abi_encode();

        assert_eq!(hex::encode(&execute[..4]), "3593564c");
        assert_eq!(hex::encode(&approve[..4]), "095ea7b3");
    }

    #[test]
    fn execute_call_roundtrips() {
        let call = UniversalRouter::executeCall {
            commands: vec![0x00u8].into(),
            inputs: vec![vec![0xde, 0xad].into(), vec![0xbe, 0xef].into()],
            deadline: U256::from(1_700_000_000u64),
        };
        let encoded = call.abi_encode();
        let decoded =
            UniversalRouter::executeCall::abi_decode(&encoded).expect("decode execute call");
        assert_eq!(decoded.commands, call.commands);
        assert_eq!(decoded.inputs, call.inputs);
        assert_eq!(decoded.deadline, call.deadline);
    }
}
