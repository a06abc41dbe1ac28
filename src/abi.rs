//! Fixed on-chain interfaces the dispatcher encodes calls against.
//!
//! The splitter and multisig contracts are given; their signatures and
//! argument orders must match these declarations exactly.

use alloy::sol;

sol! {
    /// Payment splitter: fans funds out to a payee list.
    interface ISplitter {
        /// Uniform-amount token fan-out (cheaper than `pay` for equal amounts).
        function distribute(address token, uint256 amount, address[] payees) external;
        /// General token fan-out with one amount per payee.
        function pay(address token, address[] payees, uint256[] amounts) external;
        /// Uniform-amount native-currency fan-out.
        function distributeAVAX(uint256 amount, address[] payees) external payable;
        /// General native-currency fan-out.
        function payAVAX(address[] payees, uint256[] amounts) external payable;
    }

    interface IERC20 {
        function approve(address spender, uint256 value) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }

    /// Legacy on-chain multisig: proposals are submitted as transactions.
    interface ILegacyMultisig {
        function submitTransaction(address destination, uint256 value, bytes data) external returns (uint256 transactionId);
    }

    /// Safe-style transaction payload, hashed per EIP-712 and signed before
    /// being proposed to the off-chain coordination service.
    struct SafeTx {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 safeTxGas;
        uint256 baseGas;
        uint256 gasPrice;
        address gasToken;
        address refundReceiver;
        uint256 nonce;
    }
}
