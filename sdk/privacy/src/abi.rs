//! Ledger ABI
//!
//! Solidity types and events of the shielded pool contracts. Field order and
//! widths are a wire contract with the verifying circuit and the deployed
//! contracts; do not reorder.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct TokenData {
        uint8 tokenType;
        address tokenAddress;
        uint256 tokenSubID;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct CommitmentPreimage {
        bytes32 npk;
        TokenData token;
        uint120 value;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ShieldCiphertext {
        bytes32[3] encryptedBundle;
        bytes32 shieldKey;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ShieldRequest {
        CommitmentPreimage preimage;
        ShieldCiphertext ciphertext;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct CommitmentCiphertext {
        bytes32[4] ciphertext;
        bytes32 blindedSenderViewingKey;
        bytes32 blindedReceiverViewingKey;
        bytes annotationData;
        bytes memo;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct BoundParams {
        uint16 treeNumber;
        uint72 minGasPrice;
        uint8 unshield;
        uint64 chainID;
        address adaptContract;
        bytes32 adaptParams;
        CommitmentCiphertext[] commitmentCiphertext;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct G1Point {
        uint256 x;
        uint256 y;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct G2Point {
        uint256[2] x;
        uint256[2] y;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct SnarkProof {
        G1Point a;
        G2Point b;
        G1Point c;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Transaction {
        SnarkProof proof;
        bytes32 merkleRoot;
        bytes32[] nullifiers;
        bytes32[] commitments;
        BoundParams boundParams;
        CommitmentPreimage unshieldPreimage;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Call {
        address to;
        bytes data;
        uint256 value;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct ActionData {
        bytes31 random;
        bool requireSuccess;
        uint256 minGasLimit;
        Call[] calls;
    }

    #[derive(Debug, PartialEq, Eq)]
    event Shield(
        uint256 treeNumber,
        uint256 startPosition,
        CommitmentPreimage[] commitments,
        ShieldCiphertext[] shieldCiphertext,
        uint256[] fees
    );

    #[derive(Debug, PartialEq, Eq)]
    event Transact(
        uint256 treeNumber,
        uint256 startPosition,
        bytes32[] hash,
        CommitmentCiphertext[] ciphertext
    );

    #[derive(Debug, PartialEq, Eq)]
    event Unshield(address to, TokenData token, uint256 amount, uint256 fee);

    #[derive(Debug, PartialEq, Eq)]
    event Nullified(uint16 treeNumber, bytes32[] nullifier);
}

/// Pool-entry event as emitted before the fee field was introduced.
///
/// Shares the event name with [`Shield`] but has its own signature, so it has
/// to be decoded with these definitions rather than the current ones.
pub mod legacy {
    use alloy_sol_types::sol;

    sol! {
        #[derive(Debug, PartialEq, Eq)]
        struct TokenData {
            uint8 tokenType;
            address tokenAddress;
            uint256 tokenSubID;
        }

        #[derive(Debug, PartialEq, Eq)]
        struct CommitmentPreimage {
            bytes32 npk;
            TokenData token;
            uint120 value;
        }

        #[derive(Debug, PartialEq, Eq)]
        struct ShieldCiphertext {
            bytes32[3] encryptedBundle;
            bytes32 shieldKey;
        }

        #[derive(Debug, PartialEq, Eq)]
        event Shield(
            uint256 treeNumber,
            uint256 startPosition,
            CommitmentPreimage[] commitments,
            ShieldCiphertext[] shieldCiphertext
        );
    }

    impl From<TokenData> for super::TokenData {
        fn from(t: TokenData) -> Self {
            Self {
                tokenType: t.tokenType,
                tokenAddress: t.tokenAddress,
                tokenSubID: t.tokenSubID,
            }
        }
    }

    impl From<CommitmentPreimage> for super::CommitmentPreimage {
        fn from(p: CommitmentPreimage) -> Self {
            Self {
                npk: p.npk,
                token: p.token.into(),
                value: p.value,
            }
        }
    }

    impl From<ShieldCiphertext> for super::ShieldCiphertext {
        fn from(c: ShieldCiphertext) -> Self {
            Self {
                encryptedBundle: c.encryptedBundle,
                shieldKey: c.shieldKey,
            }
        }
    }
}
