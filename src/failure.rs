//! Failure taxonomy (§4.C, §7)
//!
//! Two orthogonal error kinds exist at the boundary of an opcode handler:
//! an opaque reason (`"unbalanced conditional"`, `"stack overflow"`, ...) or
//! a solver-attributed failure whose payload is the ordered list of
//! `(FailureCode, pc)` pairs recovered from an unsat core. The reference
//! implementation distinguishes these by a string prefix
//! (`SCRIPT_FAILURE_PREFIX_SOLVER`) before parsing; we keep the same
//! observable split but encode it as an enum rather than a sentinel string.

use std::fmt;

/// The fixed, enumerable taxonomy of named failure codes (spec.md §7).
///
/// Each variant is assigned a dense integer id (`FailureCode::id`) used only
/// when the solver backend is configured to *not* track assertions
/// individually (`EnvConfig`-level "no tracked assertions for error codes"
/// option) — in that mode the encoding is `¬expr ⇒ failure_code == id`
/// rather than a named, tracked assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureCode {
    DataTooLong,
    LengthMismatch,
    ScriptnumOutOfBounds,
    ScriptnumEncodingExceedsDatalen,
    ScriptnumMinimalEncoding,
    NegativeArgument,
    ArgumentAboveBounds,
    BranchConditionInvalid,
    MinimalIf,
    InvalidPubkey,
    InvalidPubkeyLength,
    InvalidSignatureLength,
    InvalidSignatureEncoding,
    SignatureLowS,
    SignatureBadHashtype,
    SignatureExplicitSighashAll,
    SignatureNullfail,
    CheckSigVerify,
    CheckMultisigVerify,
    CheckSigFromStackVerify,
    CheckMultisigBugbyteZero,
    EcMulVerify,
    TweakVerify,
    KnownArgsDifferentResult,
    KnownResultDifferentArgs,
    LocktimeTypeMismatch,
    LocktimeTimelockInEffect,
    CltvNsequenceFinal,
    NsequenceTimelockInEffect,
    NsequenceTypeMismatch,
    BadTxVersion,
    Verify,
    EqualVerify,
    NumEqualVerify,
    FinalVerify,
    Sha256ContextTooShort,
    Sha256ContextTooLong,
    InvalidSha256Context,
    Int64OutOfBounds,
    InvalidArguments,
    OutOfMoneyRange,
    Le64WrongSize,
    Le32WrongSize,
    CommitmentWrongSize,
}

impl FailureCode {
    /// Dense integer id, stable within one process (order of this match,
    /// not insertion order at runtime) — used for the "untracked assertion"
    /// solver encoding.
    pub fn id(self) -> u32 {
        use FailureCode::*;
        match self {
            DataTooLong => 0,
            LengthMismatch => 1,
            ScriptnumOutOfBounds => 2,
            ScriptnumEncodingExceedsDatalen => 3,
            ScriptnumMinimalEncoding => 4,
            NegativeArgument => 5,
            ArgumentAboveBounds => 6,
            BranchConditionInvalid => 7,
            MinimalIf => 8,
            InvalidPubkey => 9,
            InvalidPubkeyLength => 10,
            InvalidSignatureLength => 11,
            InvalidSignatureEncoding => 12,
            SignatureLowS => 13,
            SignatureBadHashtype => 14,
            SignatureExplicitSighashAll => 15,
            SignatureNullfail => 16,
            CheckSigVerify => 17,
            CheckMultisigVerify => 18,
            CheckSigFromStackVerify => 19,
            CheckMultisigBugbyteZero => 20,
            EcMulVerify => 21,
            TweakVerify => 22,
            KnownArgsDifferentResult => 23,
            KnownResultDifferentArgs => 24,
            LocktimeTypeMismatch => 25,
            LocktimeTimelockInEffect => 26,
            CltvNsequenceFinal => 27,
            NsequenceTimelockInEffect => 28,
            NsequenceTypeMismatch => 29,
            BadTxVersion => 30,
            Verify => 31,
            EqualVerify => 32,
            NumEqualVerify => 33,
            FinalVerify => 34,
            Sha256ContextTooShort => 35,
            Sha256ContextTooLong => 36,
            InvalidSha256Context => 37,
            Int64OutOfBounds => 38,
            InvalidArguments => 39,
            OutOfMoneyRange => 40,
            Le64WrongSize => 41,
            Le32WrongSize => 42,
            CommitmentWrongSize => 43,
        }
    }

    /// Machine/human name used both in tracked-assertion names
    /// (`check_<code>~<N>@<pos>`) and in reports.
    pub fn name(self) -> &'static str {
        use FailureCode::*;
        match self {
            DataTooLong => "data_too_long",
            LengthMismatch => "length_mismatch",
            ScriptnumOutOfBounds => "scriptnum_out_of_bounds",
            ScriptnumEncodingExceedsDatalen => "scriptnum_encoding_exceeds_datalen",
            ScriptnumMinimalEncoding => "scriptnum_minimal_encoding",
            NegativeArgument => "negative_argument",
            ArgumentAboveBounds => "argument_above_bounds",
            BranchConditionInvalid => "branch_condition_invalid",
            MinimalIf => "minimalif",
            InvalidPubkey => "invalid_pubkey",
            InvalidPubkeyLength => "invalid_pubkey_length",
            InvalidSignatureLength => "invalid_signature_length",
            InvalidSignatureEncoding => "invalid_signature_encoding",
            SignatureLowS => "signature_low_s",
            SignatureBadHashtype => "signature_bad_hashtype",
            SignatureExplicitSighashAll => "signature_explicit_sighash_all",
            SignatureNullfail => "signature_nullfail",
            CheckSigVerify => "checksigverify",
            CheckMultisigVerify => "checkmultisigverify",
            CheckSigFromStackVerify => "checksigfromstackverify",
            CheckMultisigBugbyteZero => "checkmultisig_bugbyte_zero",
            EcMulVerify => "ecmultverify",
            TweakVerify => "tweakverify",
            KnownArgsDifferentResult => "known_args_different_result",
            KnownResultDifferentArgs => "known_result_different_args",
            LocktimeTypeMismatch => "locktime_type_mismatch",
            LocktimeTimelockInEffect => "locktime_timelock_in_effect",
            CltvNsequenceFinal => "cltv_nsequence_final",
            NsequenceTimelockInEffect => "nsequence_timelock_in_effect",
            NsequenceTypeMismatch => "nsequence_type_mismatch",
            BadTxVersion => "bad_tx_version",
            Verify => "verify",
            EqualVerify => "equalverify",
            NumEqualVerify => "numequalverify",
            FinalVerify => "final_verify",
            Sha256ContextTooShort => "sha256_context_too_short",
            Sha256ContextTooLong => "sha256_context_too_long",
            InvalidSha256Context => "invalid_sha256_context",
            Int64OutOfBounds => "int64_out_of_bounds",
            InvalidArguments => "invalid_arguments",
            OutOfMoneyRange => "out_of_money_range",
            Le64WrongSize => "le64_wrong_size",
            Le32WrongSize => "le32_wrong_size",
            CommitmentWrongSize => "commitment_wrong_size",
        }
    }

    /// Parse back from the `name()` string (used when reading a tracking
    /// name out of an unsat core).
    pub fn from_name(s: &str) -> Option<Self> {
        use FailureCode::*;
        Some(match s {
            "data_too_long" => DataTooLong,
            "length_mismatch" => LengthMismatch,
            "scriptnum_out_of_bounds" => ScriptnumOutOfBounds,
            "scriptnum_encoding_exceeds_datalen" => ScriptnumEncodingExceedsDatalen,
            "scriptnum_minimal_encoding" => ScriptnumMinimalEncoding,
            "negative_argument" => NegativeArgument,
            "argument_above_bounds" => ArgumentAboveBounds,
            "branch_condition_invalid" => BranchConditionInvalid,
            "minimalif" => MinimalIf,
            "invalid_pubkey" => InvalidPubkey,
            "invalid_pubkey_length" => InvalidPubkeyLength,
            "invalid_signature_length" => InvalidSignatureLength,
            "invalid_signature_encoding" => InvalidSignatureEncoding,
            "signature_low_s" => SignatureLowS,
            "signature_bad_hashtype" => SignatureBadHashtype,
            "signature_explicit_sighash_all" => SignatureExplicitSighashAll,
            "signature_nullfail" => SignatureNullfail,
            "checksigverify" => CheckSigVerify,
            "checkmultisigverify" => CheckMultisigVerify,
            "checksigfromstackverify" => CheckSigFromStackVerify,
            "checkmultisig_bugbyte_zero" => CheckMultisigBugbyteZero,
            "ecmultverify" => EcMulVerify,
            "tweakverify" => TweakVerify,
            "known_args_different_result" => KnownArgsDifferentResult,
            "known_result_different_args" => KnownResultDifferentArgs,
            "locktime_type_mismatch" => LocktimeTypeMismatch,
            "locktime_timelock_in_effect" => LocktimeTimelockInEffect,
            "cltv_nsequence_final" => CltvNsequenceFinal,
            "nsequence_timelock_in_effect" => NsequenceTimelockInEffect,
            "nsequence_type_mismatch" => NsequenceTypeMismatch,
            "bad_tx_version" => BadTxVersion,
            "verify" => Verify,
            "equalverify" => EqualVerify,
            "numequalverify" => NumEqualVerify,
            "final_verify" => FinalVerify,
            "sha256_context_too_short" => Sha256ContextTooShort,
            "sha256_context_too_long" => Sha256ContextTooLong,
            "invalid_sha256_context" => InvalidSha256Context,
            "int64_out_of_bounds" => Int64OutOfBounds,
            "invalid_arguments" => InvalidArguments,
            "out_of_money_range" => OutOfMoneyRange,
            "le64_wrong_size" => Le64WrongSize,
            "le32_wrong_size" => Le32WrongSize,
            "commitment_wrong_size" => CommitmentWrongSize,
            _ => return None,
        })
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Non-local escape from an opcode handler or finalization (§7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptFailure {
    /// A single opaque reason not attributable to one tracked assertion
    /// (stack shape errors, unbalanced conditionals, capability cliffs).
    #[error("script failure at pc={pc}: {reason}")]
    Opaque {
        /// Program counter at which the handler raised.
        pc: u32,
        /// Human-readable reason.
        reason: String,
    },
    /// A solver-attributed failure: the unsat core named these codes, each
    /// with the opcode position recovered from its `@L<n>` tag, in the
    /// order they were parsed out of the core.
    #[error("solver-attributed failure: {codes:?}")]
    Solver {
        /// `(code, pc)` pairs in unsat-core order.
        codes: Vec<(FailureCode, u32)>,
    },
    /// The SMT backend returned `unknown` for every retry and
    /// `exit_on_unknown` is set.
    #[error("solver returned unknown after exhausting retries at pc={pc}")]
    SolverUnknown {
        /// Program counter of the check that gave up.
        pc: u32,
    },
}

impl ScriptFailure {
    /// Construct an opaque failure.
    pub fn opaque(pc: u32, reason: impl Into<String>) -> Self {
        ScriptFailure::Opaque { pc, reason: reason.into() }
    }

    /// Construct a single-code solver failure, the common case when a
    /// handler raises directly rather than going through a forced check.
    pub fn solver_one(code: FailureCode, pc: u32) -> Self {
        ScriptFailure::Solver { codes: vec![(code, pc)] }
    }

    /// Parse an unsat core's tracking names back into `(code, pc)` pairs.
    ///
    /// Tracking names have the shape `check_<code>~<N>@<pos>`; `<N>` is a
    /// deduplication counter (ignored here) and `<pos>` is the pc tag
    /// installed when the assertion was added.
    pub fn parse_failcodes<'a>(names: impl Iterator<Item = &'a str>) -> Vec<(FailureCode, u32)> {
        let mut out = Vec::new();
        for n in names {
            let Some(rest) = n.strip_prefix("check_") else { continue };
            let Some((code_part, pos_part)) = rest.split_once('@') else { continue };
            let code_name = code_part.split('~').next().unwrap_or(code_part);
            let Some(code) = FailureCode::from_name(code_name) else { continue };
            let Ok(pos) = pos_part.parse::<u32>() else { continue };
            out.push((code, pos));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrips_through_from_name() {
        let all = [
            FailureCode::DataTooLong,
            FailureCode::FinalVerify,
            FailureCode::SignatureNullfail,
            FailureCode::CommitmentWrongSize,
        ];
        for code in all {
            assert_eq!(FailureCode::from_name(code.name()), Some(code));
        }
    }

    #[test]
    fn ids_are_dense_and_unique() {
        let mut ids: Vec<u32> = (0..44).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 44);
    }

    #[test]
    fn parse_failcodes_extracts_code_and_pc() {
        let names = ["check_final_verify~0@12", "garbage", "check_verify~1@3"];
        let parsed = ScriptFailure::parse_failcodes(names.into_iter());
        assert_eq!(parsed, vec![(FailureCode::FinalVerify, 12), (FailureCode::Verify, 3)]);
    }
}
