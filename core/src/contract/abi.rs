//! ink! contract metadata and message transcoding.
use crate::{
	error::{Error, Result},
	types::HexBytes,
};
use contract_transcode::ContractMessageTranscoder;
use ink_metadata::InkProject;
use serde_json::{Map, Value};

/// Bundle sections which are not part of the ABI.
const BUNDLE_SECTIONS: [&str; 4] = ["source", "contract", "image", "user"];

/// Constructor arguments of a deployment.
///
/// An empty argument list is the no-argument marker and encodes to the selector alone.
pub enum ConstructorArgs<'a> {
	NoArguments,
	Values(&'a [Value]),
}

impl<'a> From<&'a [Value]> for ConstructorArgs<'a> {
	fn from(values: &'a [Value]) -> Self {
		if values.is_empty() {
			return ConstructorArgs::NoArguments;
		}
		ConstructorArgs::Values(values)
	}
}

/// Renders a request argument in the transcoder's text notation.
///
/// Strings are taken verbatim, so SS58 addresses, `0x` hex and enum literals
/// such as `Some(5)` pass through unchanged. Quote a string argument as `"\"text\""`.
fn to_scon(value: &Value) -> String {
	fn joined<'a>(items: impl Iterator<Item = String> + 'a) -> String {
		items.collect::<Vec<_>>().join(", ")
	}

	match value {
		Value::Null => "None".to_string(),
		Value::Bool(flag) => flag.to_string(),
		Value::Number(number) => number.to_string(),
		Value::String(text) => text.clone(),
		Value::Array(items) => format!("[{}]", joined(items.iter().map(to_scon))),
		Value::Object(fields) => format!(
			"{{ {} }}",
			joined(fields.iter().map(|(name, value)| format!("{name}: {}", to_scon(value))))
		),
	}
}

pub struct ContractAbi {
	transcoder: ContractMessageTranscoder,
	constructors: Vec<String>,
	/// Code bundled in `source.wasm`
	pub wasm: Option<Vec<u8>>,
}

impl ContractAbi {
	/// Parses a contract bundle or a plain ABI document.
	pub fn parse(metadata: &Value) -> Result<Self> {
		let bundle = metadata
			.as_object()
			.ok_or_else(|| Error::codec("Contract metadata must be a JSON object"))?;

		let wasm = match bundle.get("source").and_then(|source| source.get("wasm")) {
			Some(Value::String(wasm)) => Some(wasm.parse::<HexBytes>()?.0),
			_ => None,
		};

		let abi = bundle
			.iter()
			.filter(|(section, _)| !BUNDLE_SECTIONS.contains(&section.as_str()))
			.map(|(section, value)| (section.clone(), value.clone()))
			.collect::<Map<_, _>>();
		let project: InkProject = serde_json::from_value(Value::Object(abi))
			.map_err(|error| Error::codec(format!("Invalid contract metadata: {error}")))?;

		let constructors = project
			.spec()
			.constructors()
			.iter()
			.map(|constructor| constructor.label().to_string())
			.collect();

		Ok(ContractAbi {
			transcoder: ContractMessageTranscoder::new(project),
			constructors,
			wasm,
		})
	}

	/// Deployments always go through the first declared constructor.
	pub fn default_constructor(&self) -> Result<&str> {
		self.constructors
			.first()
			.map(String::as_str)
			.ok_or_else(|| Error::codec("Contract metadata declares no constructors"))
	}

	fn encode(&self, label: &str, values: &[Value]) -> Result<Vec<u8>> {
		let args = values.iter().map(to_scon).collect::<Vec<_>>();
		self.transcoder
			.encode(label, args)
			.map_err(|error| Error::codec(format!("{label}: {error:#}")))
	}

	/// Selector followed by the encoded constructor arguments.
	pub fn encode_constructor(&self, label: &str, args: ConstructorArgs<'_>) -> Result<Vec<u8>> {
		match args {
			ConstructorArgs::NoArguments => self.encode(label, &[]),
			ConstructorArgs::Values(values) => self.encode(label, values),
		}
	}

	pub fn encode_message(&self, label: &str, values: &[Value]) -> Result<Vec<u8>> {
		self.encode(label, values)
	}

	/// Decodes data returned by a message, rendered in the transcoder's text notation.
	pub fn decode_output(&self, label: &str, data: &[u8]) -> Result<Value> {
		self.transcoder
			.decode_message_return(label, &mut &data[..])
			.map(|value| Value::String(value.to_string()))
			.map_err(|error| Error::codec(format!("{label}: {error:#}")))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use serde_json::json;

	pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

	fn type_spec(display_name: &[&str], id: u32) -> Value {
		json!({ "displayName": display_name, "type": id })
	}

	fn message(label: &str, selector: &str, mutates: bool, args: Value, returns: u32) -> Value {
		json!({
			"label": label,
			"selector": selector,
			"mutates": mutates,
			"payable": false,
			"default": false,
			"docs": [],
			"args": args,
			"returnType": type_spec(&["ink", "MessageResult"], returns)
		})
	}

	/// Flipper bundle with an extra transfer message, in the ink! 5 layout.
	pub fn metadata() -> Value {
		json!({
			"source": { "hash": "0x00", "language": "ink! 5.0.0", "compiler": "rustc 1.78.0", "wasm": "0x0061736d" },
			"contract": { "name": "flipper", "version": "0.1.0", "authors": [] },
			"spec": {
				"constructors": [
					{
						"label": "new",
						"selector": "0x9bae9d5e",
						"payable": false,
						"default": false,
						"docs": [],
						"args": [{ "label": "init_value", "type": type_spec(&["bool"], 0) }],
						"returnType": type_spec(&["ink_primitives", "ConstructorResult"], 3)
					},
					{
						"label": "new_default",
						"selector": "0x61ef7e3e",
						"payable": false,
						"default": false,
						"docs": [],
						"args": [],
						"returnType": type_spec(&["ink_primitives", "ConstructorResult"], 3)
					}
				],
				"docs": [],
				"environment": {
					"accountId": type_spec(&["AccountId"], 7),
					"balance": type_spec(&["Balance"], 8),
					"blockNumber": type_spec(&["BlockNumber"], 11),
					"chainExtension": type_spec(&["ChainExtension"], 12),
					"hash": type_spec(&["Hash"], 9),
					"maxEventTopics": 4,
					"staticBufferSize": 16384,
					"timestamp": type_spec(&["Timestamp"], 10)
				},
				"events": [],
				"lang_error": type_spec(&["ink", "LangError"], 2),
				"messages": [
					message("flip", "0x633aa551", true, json!([]), 3),
					message("get", "0x2f865bd9", false, json!([]), 4),
					message(
						"transfer",
						"0x84a15da1",
						true,
						json!([
							{ "label": "to", "type": type_spec(&["AccountId"], 7) },
							{ "label": "value", "type": type_spec(&["Balance"], 8) }
						]),
						3
					)
				]
			},
			"storage": { "struct": { "name": "Flipper", "fields": [] } },
			"types": [
				{ "id": 0, "type": { "def": { "primitive": "bool" } } },
				{ "id": 1, "type": { "def": { "tuple": [] } } },
				{ "id": 2, "type": {
					"path": ["ink_primitives", "LangError"],
					"def": { "variant": { "variants": [{ "name": "CouldNotReadInput", "index": 1 }] } }
				} },
				{ "id": 3, "type": {
					"path": ["Result"],
					"def": { "variant": { "variants": [
						{ "name": "Ok", "index": 0, "fields": [{ "type": 1 }] },
						{ "name": "Err", "index": 1, "fields": [{ "type": 2 }] }
					] } }
				} },
				{ "id": 4, "type": {
					"path": ["Result"],
					"def": { "variant": { "variants": [
						{ "name": "Ok", "index": 0, "fields": [{ "type": 0 }] },
						{ "name": "Err", "index": 1, "fields": [{ "type": 2 }] }
					] } }
				} },
				{ "id": 5, "type": { "def": { "primitive": "u8" } } },
				{ "id": 6, "type": { "def": { "array": { "len": 32, "type": 5 } } } },
				{ "id": 7, "type": {
					"path": ["ink_primitives", "types", "AccountId"],
					"def": { "composite": { "fields": [{ "type": 6, "typeName": "[u8; 32]" }] } }
				} },
				{ "id": 8, "type": { "def": { "primitive": "u128" } } },
				{ "id": 9, "type": {
					"path": ["ink_primitives", "types", "Hash"],
					"def": { "composite": { "fields": [{ "type": 6, "typeName": "[u8; 32]" }] } }
				} },
				{ "id": 10, "type": { "def": { "primitive": "u64" } } },
				{ "id": 11, "type": { "def": { "primitive": "u32" } } },
				{ "id": 12, "type": {
					"path": ["ink_env", "types", "NoChainExtension"],
					"def": { "variant": {} }
				} }
			],
			"version": 5
		})
	}

	/// Same bundle with an argument-less first constructor.
	pub fn no_arg_metadata() -> Value {
		let mut metadata = metadata();
		metadata["spec"]["constructors"][0]["args"] = json!([]);
		metadata
	}

	#[test]
	fn parses_bundle_and_keeps_code() {
		let abi = ContractAbi::parse(&metadata()).unwrap();
		assert_eq!(abi.default_constructor().unwrap(), "new");
		assert_eq!(abi.wasm, Some(vec![0x00, 0x61, 0x73, 0x6d]));

		let mut plain = metadata();
		plain.as_object_mut().unwrap().remove("source");
		assert_eq!(ContractAbi::parse(&plain).unwrap().wasm, None);
	}

	#[test]
	fn malformed_metadata_is_codec_error() {
		assert!(matches!(
			ContractAbi::parse(&json!({ "spec": {} })),
			Err(Error::CodecError(_))
		));
		assert!(matches!(
			ContractAbi::parse(&json!("flipper")),
			Err(Error::CodecError(_))
		));
	}

	#[test]
	fn unknown_message_is_codec_error() {
		let abi = ContractAbi::parse(&metadata()).unwrap();
		assert!(matches!(abi.encode_message("burn", &[]), Err(Error::CodecError(_))));
	}

	#[test]
	fn constructor_arguments_follow_selector() {
		let abi = ContractAbi::parse(&metadata()).unwrap();
		let values = [json!(true)];
		assert_eq!(
			abi.encode_constructor("new", values.as_slice().into()).unwrap(),
			vec![0x9b, 0xae, 0x9d, 0x5e, 0x01]
		);
		assert!(matches!(
			abi.encode_constructor("new", ConstructorArgs::NoArguments),
			Err(Error::CodecError(_))
		));
	}

	#[test]
	fn no_argument_marker_encodes_selector_only() {
		let abi = ContractAbi::parse(&no_arg_metadata()).unwrap();
		assert_eq!(
			abi.encode_constructor("new", ConstructorArgs::NoArguments)
				.unwrap(),
			vec![0x9b, 0xae, 0x9d, 0x5e]
		);
	}

	#[test]
	fn message_arguments_are_counted_and_encoded() {
		let abi = ContractAbi::parse(&metadata()).unwrap();
		assert!(matches!(
			abi.encode_message("transfer", &[json!(ALICE)]),
			Err(Error::CodecError(_))
		));
		let data = abi
			.encode_message("transfer", &[json!(ALICE), json!(10)])
			.unwrap();
		assert_eq!(data.len(), 4 + 32 + 16);
		assert_eq!(data[..4], [0x84, 0xa1, 0x5d, 0xa1]);
	}

	#[test]
	fn output_is_decoded_by_return_type() {
		let abi = ContractAbi::parse(&metadata()).unwrap();
		let output = abi.decode_output("get", &[0x00, 0x01]).unwrap();
		assert!(output.as_str().unwrap().contains("true"));
		assert!(matches!(abi.decode_output("get", &[0x07]), Err(Error::CodecError(_))));
	}

	#[test]
	fn arguments_render_as_text_notation() {
		assert_eq!(to_scon(&json!(null)), "None");
		assert_eq!(to_scon(&json!([1, true, "0x01"])), "[1, true, 0x01]");
		assert_eq!(to_scon(&json!({ "x": 1 })), "{ x: 1 }");
	}
}
