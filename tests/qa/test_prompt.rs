// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use llama_ipfs_qa::qa::build_prompt;

const SUFFIX: &str = "\nBased solely on the above context, answer the question in one word:";

#[test]
fn test_prompt_for_demo_inputs() {
    assert_eq!(
        build_prompt("France is a country.", "What is the capital of France?"),
        "Context: France is a country.\nQuestion: What is the capital of France?\nBased solely on the above context, answer the question in one word:"
    );
}

#[test]
fn test_prompt_is_byte_exact_for_any_content() {
    let cases = [
        ("", ""),
        ("  padded  ", "\ttabbed?"),
        ("line one\nline two", "multi\nline?"),
        ("{context}", "{question}"),
        ("Città è bella 🌍", "Perché?"),
        ("Context: nested", "Question: nested"),
    ];

    for (context, question) in cases {
        let prompt = build_prompt(context, question);
        let expected = ["Context: ", context, "\nQuestion: ", question, SUFFIX].concat();
        assert_eq!(prompt.as_bytes(), expected.as_bytes(), "case {:?}", (context, question));
    }
}

#[test]
fn test_prompt_does_not_trim_inputs() {
    let prompt = build_prompt(" c ", " q ");
    assert!(prompt.starts_with("Context:  c \nQuestion:  q \n"));
}
