//! Contract ABI surface consumed by the tool
//!
//! Only the methods the tool actually calls are declared. The Safe
//! interface matches the pre-1.0 Gnosis Safe (`dataGas` instead of
//! `baseGas`, no EIP-712 helpers needed here).

use alloy::primitives::{address, Address};
use alloy::sol;

/// Head of the Safe's owner linked list
pub const SENTINEL_OWNERS: Address = address!("0x0000000000000000000000000000000000000001");

/// `Enum.Operation.Call`
pub const OPERATION_CALL: u8 = 0;

/// Gas attached to offline `approveHash` calls
pub const APPROVE_HASH_GAS: u64 = 1_000_000;

sol! {
    /// Gnosis Safe (multisig wallet)
    #[sol(rpc)]
    interface IGnosisSafe {
        function setup(address[] calldata _owners, uint256 _threshold, address to, bytes calldata data) external;

        function addOwnerWithThreshold(address owner, uint256 _threshold) external;
        function removeOwner(address prevOwner, address owner, uint256 _threshold) external;
        function swapOwner(address prevOwner, address oldOwner, address newOwner) external;
        function changeThreshold(uint256 _threshold) external;
        function enableModule(address module) external;

        function getOwners() external view returns (address[] memory);
        function getThreshold() external view returns (uint256);
        function getModules() external view returns (address[] memory);
        function nonce() external view returns (uint256);

        function getTransactionHash(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 dataGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            uint256 _nonce
        ) external view returns (bytes32);

        function approveHash(bytes32 hashToApprove) external;

        function execTransaction(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 dataGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes calldata signatures
        ) external returns (bool success);

        event ExecutionFailed(bytes32 txHash);
    }

    /// DutchX policy module (seller and complete flavours share this surface)
    #[sol(rpc)]
    interface IDutchXModule {
        function setup(address dx, address[] calldata tokens, address[] calldata operators, address safe) external;

        function addOperator(address operator) external;
        function removeOperator(address operator) external;
        function addToWhitelist(address token) external;
        function removeFromWhitelist(address token) external;

        function getWhitelistedOperators() external view returns (address[] memory);
        function getWhitelistedTokens() external view returns (address[] memory);
    }

    /// DutchExchange, custodian of module balances
    #[sol(rpc)]
    interface IDutchExchange {
        function balances(address user, address token) external view returns (uint256);
        function withdraw(address tokenAddress, uint256 amount) external returns (uint256);
    }

    /// ERC20 token with the human friendly extensions
    #[sol(rpc)]
    interface IToken {
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string memory);
        function name() external view returns (string memory);
    }

    /// Proxy factory used to deploy Safe and module proxies
    #[sol(rpc)]
    interface IProxyFactory {
        function createProxy(address masterCopy, bytes calldata data) external returns (address proxy);

        event ProxyCreation(address proxy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{keccak256, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn test_selectors_match_signatures() {
        let swap = keccak256("swapOwner(address,address,address)");
        assert_eq!(IGnosisSafe::swapOwnerCall::SELECTOR.as_slice(), &swap[..4]);

        let remove = keccak256("removeOwner(address,address,uint256)");
        assert_eq!(IGnosisSafe::removeOwnerCall::SELECTOR.as_slice(), &remove[..4]);

        let whitelist = keccak256("addToWhitelist(address)");
        assert_eq!(IDutchXModule::addToWhitelistCall::SELECTOR.as_slice(), &whitelist[..4]);
    }

    #[test]
    fn test_add_owner_encoding_layout() {
        let owner = address!("0x00000000000000000000000000000000000000aa");
        let data = IGnosisSafe::addOwnerWithThresholdCall {
            owner,
            _threshold: U256::from(2),
        }
        .abi_encode();

        // selector + two static words
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(data[4 + 32 + 31], 2);
    }
}
